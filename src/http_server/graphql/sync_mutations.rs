use async_graphql::{Context, ID, Object, SimpleObject};

use crate::http_server::graphql::context::{get_app_state, require_credential, token_rejected};
use crate::http_server::graphql_error::GraphqlResult;
use crate::services::spotify::sync::{self, SyncError};

#[derive(Debug, Clone, SimpleObject)]
pub struct SyncOutcome {
    pub added: i64,
    pub removed: i64,
    pub message: String,
}

#[derive(Default)]
pub struct SyncMutation;

#[Object]
impl SyncMutation {
    /// Copy the newest `count` tracks of the source playlist into the target,
    /// evicting the target's oldest tracks to keep it at `count`.
    async fn sync_playlists(
        &self,
        ctx: &Context<'_>,
        source_id: ID,
        target_id: ID,
        #[graphql(default = 50)] count: i32,
    ) -> GraphqlResult<SyncOutcome> {
        let limit = u32::try_from(count).map_err(|_| SyncError::InvalidLimit(count.into()))?;
        let app_state = get_app_state(ctx)?;
        let credential = require_credential(ctx).await?;

        let result = sync::sync_playlists(
            app_state.stores.as_ref(),
            &credential,
            &source_id,
            &target_id,
            limit,
        )
        .await;

        match result {
            Ok(result) => Ok(SyncOutcome {
                added: result.added as i64,
                removed: result.removed as i64,
                message: result.message(),
            }),
            Err(SyncError::Unauthorized(error)) => {
                Err(token_rejected(ctx, error.to_string()).await.into())
            }
            Err(error) => Err(error.into()),
        }
    }
}
