use color_eyre::Result;
use color_eyre::eyre::Context;
use opentelemetry::KeyValue;
use opentelemetry::trace::TracerProvider;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::trace::SdkTracerProvider;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Crates that log every request or frame at debug level.
const NOISY_TARGETS: [&str; 4] = ["hyper_util", "h2", "tonic", "reqwest"];

/// Append `target=warn` for each noisy dependency the caller did not mention.
fn filter_directives(tracing_level: &str) -> String {
    NOISY_TARGETS
        .iter()
        .filter(|target| !tracing_level.contains(*target))
        .fold(tracing_level.to_string(), |directives, target| {
            format!("{directives},{target}=warn")
        })
}

fn otlp_tracer_provider(service_name: &str, otlp_endpoint: &str) -> Result<SdkTracerProvider> {
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(otlp_endpoint)
        .build()
        .wrap_err_with(|| format!("Failed to create OTLP span exporter for {otlp_endpoint}"))?;

    let resource = Resource::builder()
        .with_attributes([KeyValue::new(
            opentelemetry_semantic_conventions::resource::SERVICE_NAME,
            service_name.to_string(),
        )])
        .build();

    Ok(SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(resource)
        .build())
}

/// Install the global tracing subscriber. Logs go to stderr so they never mix
/// with the interactive prompts on stdout. When `otlp_endpoint` is set, spans
/// are also exported over OTLP and the provider is returned for shutdown.
pub fn init_tracing(
    service_name: &str,
    otlp_endpoint: Option<&str>,
    tracing_level: &str,
) -> Result<Option<SdkTracerProvider>> {
    let tracer_provider = otlp_endpoint
        .map(|endpoint| otlp_tracer_provider(service_name, endpoint))
        .transpose()?;

    let telemetry_layer = tracer_provider.as_ref().map(|provider| {
        opentelemetry::global::set_tracer_provider(provider.clone());
        tracing_opentelemetry::layer().with_tracer(provider.tracer(service_name.to_string()))
    });

    let filter_layer = EnvFilter::try_new(filter_directives(tracing_level))
        .wrap_err_with(|| format!("Invalid log level: {tracing_level}"))?;

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(
            tracing_subscriber::fmt::layer()
                .pretty()
                .with_writer(std::io::stderr),
        )
        .with(telemetry_layer)
        .init();

    Ok(tracer_provider)
}
