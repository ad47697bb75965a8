//! Tracing setup: JSON logs to stdout always, plus optional OTLP export
//! of traces and logs when a collector endpoint is configured.

use anyhow::Result;
use opentelemetry::{trace::TracerProvider as _, KeyValue};
use opentelemetry_appender_tracing::layer::OpenTelemetryTracingBridge;
use opentelemetry_otlp::{LogExporter, SpanExporter, WithExportConfig};
use opentelemetry_sdk::{
    logs::LoggerProvider,
    propagation::TraceContextPropagator,
    runtime,
    trace::{RandomIdGenerator, Sampler, TracerProvider as SdkTracerProvider},
    Resource,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub struct TelemetryConfig {
    pub service_name: String,
    pub otel_endpoint: String,
    pub otel_enabled: bool,
    pub log_level: String,
}

/// OTLP providers kept alive for the process lifetime. Dropping them
/// without calling [`OtelProviders::shutdown`] loses buffered spans and
/// log records.
pub struct OtelProviders {
    tracer_provider: SdkTracerProvider,
    logger_provider: LoggerProvider,
}

impl OtelProviders {
    fn build(config: &TelemetryConfig) -> Result<Self> {
        let resource = Resource::new(vec![KeyValue::new(
            opentelemetry_semantic_conventions::resource::SERVICE_NAME,
            config.service_name.clone(),
        )]);

        let tracer_provider = SdkTracerProvider::builder()
            .with_batch_exporter(
                SpanExporter::builder()
                    .with_tonic()
                    .with_endpoint(&config.otel_endpoint)
                    .build()?,
                runtime::Tokio,
            )
            .with_sampler(Sampler::AlwaysOn)
            .with_id_generator(RandomIdGenerator::default())
            .with_resource(resource.clone())
            .build();

        let logger_provider = LoggerProvider::builder()
            .with_batch_exporter(
                LogExporter::builder()
                    .with_tonic()
                    .with_endpoint(&config.otel_endpoint)
                    .build()?,
                runtime::Tokio,
            )
            .with_resource(resource)
            .build();

        Ok(Self {
            tracer_provider,
            logger_provider,
        })
    }

    /// Flush and stop the exporters. Run from a shutdown closer so
    /// buffered telemetry makes it out before the process exits.
    pub fn shutdown(self) {
        if let Err(e) = self.tracer_provider.shutdown() {
            eprintln!("Error shutting down tracer provider: {:?}", e);
        }
        if let Err(e) = self.logger_provider.shutdown() {
            eprintln!("Error shutting down logger provider: {:?}", e);
        }
    }
}

/// Install the global tracing subscriber. Returns the OTLP providers when
/// export is enabled, `None` otherwise (nothing to shut down).
pub fn init_telemetry(config: &TelemetryConfig) -> Result<Option<OtelProviders>> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_span_list(true)
        .with_current_span(true);

    if !config.otel_enabled {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .init();
        return Ok(None);
    }

    // W3C Trace Context propagation for outbound requests
    opentelemetry::global::set_text_map_propagator(TraceContextPropagator::new());

    let providers = OtelProviders::build(config)?;
    let tracer = providers.tracer_provider.tracer("fanctl");

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .with(tracing_opentelemetry::layer().with_tracer(tracer))
        .with(OpenTelemetryTracingBridge::new(&providers.logger_provider))
        .init();

    Ok(Some(providers))
}
