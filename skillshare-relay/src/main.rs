use std::net::SocketAddr;

use anyhow::Context;
use skillshare_api::{AuthToken, Uuid};
use skillshare_relay::{app, Topics};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(structopt::StructOpt)]
struct Opt {
    /// Address to listen on
    #[structopt(long, env = "LISTEN_ADDR", default_value = "127.0.0.1:8090")]
    listen: SocketAddr,

    /// Token allowing to publish messages, publishing is disabled if unset
    #[structopt(long, env = "ADMIN_TOKEN", parse(try_from_str = Uuid::try_parse))]
    admin_token: Option<Uuid>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            tracing_subscriber::EnvFilter::new("skillshare_relay=debug,tower_http=debug")
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let opt = <Opt as structopt::StructOpt>::from_args();
    if opt.admin_token.is_none() {
        tracing::warn!("no ADMIN_TOKEN configured, publishing is disabled");
    }

    let app = app(Topics::new(), opt.admin_token.map(AuthToken));
    tracing::info!("listening on {}", opt.listen);
    axum::Server::bind(&opt.listen)
        .serve(app.into_make_service_with_connect_info::<SocketAddr>())
        .await
        .context("serving axum webserver")
}
