use crate::{
    admission::Admission,
    core::{
        cn::{self, CommonNames},
        Mutator, Synthesizer,
    },
    metrics::AdmissionMetrics,
};
use anyhow::{bail, Result};
use clap::{CommandFactory, FromArgMatches, Parser};
use prometheus_client::registry::Registry;
use tracing::info;

const SERVER_ADDR: &str = "0.0.0.0:4443";
const SERVER_TLS_KEY: &str = "/data/tls.key";
const SERVER_TLS_CERTS: &str = "/data/tls.crt";

/// Adds TLS blocks and cert-manager annotations to Ingresses.
///
/// Every host of an admitted Ingress is listed in a TLS block whose secret is
/// named `auto-<name>-tls`. When every host is longer than 63 bytes a short
/// Common Name is listed first: the first `--default-cn` that fits or, when
/// none is set, the shortest host chomped in front followed by a random
/// suffix and `--cn-domain`.
#[derive(Debug, Parser)]
#[clap(name = "tls-host-controller", version)]
pub struct Args {
    #[clap(
        long,
        default_value = "tls_host_controller=info,warn",
        env = "TLS_HOST_CONTROLLER_LOG"
    )]
    log_level: kubert::LogFilter,

    #[clap(long, default_value = "plain")]
    log_format: kubert::LogFormat,

    #[clap(flatten)]
    client: kubert::ClientArgs,

    #[clap(flatten)]
    server: kubert::ServerArgs,

    #[clap(flatten)]
    admin: kubert::AdminArgs,

    /// Comma-separated Common Names to use when every host is too long.
    #[clap(long, default_value = "", env = "TLS_HOST_CONTROLLER_DEFAULT_CN")]
    default_cn: CommonNames,

    /// Parent domain of derived Common Names.
    #[clap(
        long,
        default_value = cn::DEFAULT_DOMAIN,
        env = "TLS_HOST_CONTROLLER_CN_DOMAIN"
    )]
    cn_domain: String,
}

/// The webhook serves TLS on 4443 with certificates mounted at `/data` unless
/// told otherwise.
fn command() -> clap::Command {
    Args::command()
        .mut_arg("server_addr", |arg| arg.default_value(SERVER_ADDR))
        .mut_arg("server_tls_key", |arg| arg.default_value(SERVER_TLS_KEY))
        .mut_arg("server_tls_certs", |arg| arg.default_value(SERVER_TLS_CERTS))
}

impl Args {
    #[inline]
    pub async fn parse_and_run() -> Result<()> {
        let matches = command().get_matches();
        Self::from_arg_matches(&matches)
            .unwrap_or_else(|error| error.exit())
            .run()
            .await
    }

    pub async fn run(self) -> Result<()> {
        let Self {
            admin,
            client,
            log_level,
            log_format,
            server,
            default_cn,
            cn_domain,
        } = self;

        let synthesizer = Synthesizer::new(default_cn, cn_domain)?;

        let mut prom = <Registry>::with_prefix("tls_host_controller");
        let metrics = AdmissionMetrics::register(prom.sub_registry_with_prefix("admission"));
        let admission = Admission::new(Mutator::new(synthesizer), metrics);

        let runtime = kubert::Runtime::builder()
            .with_log(log_level, log_format)
            .with_admin(admin.into_builder().with_prometheus(prom))
            .with_client(client)
            .with_server(server)
            .build()
            .await?;

        info!(?admission, "Serving admission requests");
        let runtime = runtime.spawn_server(admission);

        // Runs until a shutdown signal is received and the server has drained.
        if runtime.run().await.is_err() {
            bail!("Aborted");
        }

        Ok(())
    }
}
