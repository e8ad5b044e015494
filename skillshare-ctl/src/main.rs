use std::{path::PathBuf, sync::Arc};

use anyhow::Context;
use skillshare_api::{AuthToken, PostId, Publish, Topic, UserId, Uuid};
use skillshare_client::{Config, LogDesktop, Session};

#[derive(structopt::StructOpt)]
struct Opt {
    /// Base url of the HTTP API
    #[structopt(short, long, env = "SKILLSHARE_HOST")]
    host: String,

    /// Base url of the push relay
    #[structopt(short, long, env = "SKILLSHARE_RELAY")]
    relay: String,

    /// Id of the user to act as
    #[structopt(short, long, default_value = "")]
    user: String,

    /// JSON client configuration file
    #[structopt(short, long, env = "SKILLSHARE_CONFIG")]
    config: Option<PathBuf>,

    #[structopt(subcommand)]
    cmd: Command,
}

#[derive(structopt::StructOpt)]
enum Command {
    /// Print the live state of a post until interrupted
    WatchPost {
        /// Post id
        post: String,
    },

    /// Print the notifications of the user until interrupted
    WatchNotifications,

    /// Comment on a post
    Comment {
        /// Post id
        post: String,

        /// Comment text
        text: String,
    },

    /// Publish a message on the relay
    Publish {
        /// Topic name, eg. /topic/posts/42/activity
        topic: String,

        /// JSON body to deliver
        body: String,
    },
}

fn admin_token() -> anyhow::Result<AuthToken> {
    let tok =
        std::env::var("ADMIN_TOKEN").context("retrieving ADMIN_TOKEN environment variable")?;
    let tok = Uuid::try_parse(&tok).context("parsing ADMIN_TOKEN as an auth token")?;
    Ok(AuthToken(tok))
}

fn user(opt: &Opt) -> anyhow::Result<UserId> {
    if opt.user.is_empty() {
        anyhow::bail!("this command needs a --user");
    }
    Ok(UserId(opt.user.clone()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let opt = <Opt as structopt::StructOpt>::from_args();
    let config = match &opt.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    match &opt.cmd {
        Command::WatchPost { post } => {
            let session = Session::connect(user(&opt)?, &opt.host, &opt.relay, config);
            let view = session.open_post(PostId(post.clone()));
            let mut snapshots = view.watch();
            loop {
                let snap = snapshots.borrow_and_update().clone();
                println!(
                    "[{:?}/{:?}] {} likes{}",
                    snap.load,
                    snap.connection,
                    snap.like_count,
                    if snap.liked { " (liked)" } else { "" }
                );
                for c in snap.comments {
                    let mark = match (c.removing, c.is_new, c.is_updated) {
                        (true, _, _) => "-",
                        (_, true, _) => "+",
                        (_, _, true) => "~",
                        _ => " ",
                    };
                    let author = c
                        .comment
                        .author_name
                        .as_deref()
                        .unwrap_or(&c.comment.author_id.0);
                    println!("  {mark} {author}: {}", c.comment.text);
                }
                tokio::select! {
                    res = snapshots.changed() => res.context("post view stopped")?,
                    _ = tokio::signal::ctrl_c() => break,
                }
            }
        }
        Command::WatchNotifications => {
            let session = Session::connect(user(&opt)?, &opt.host, &opt.relay, config)
                .with_desktop(Arc::new(LogDesktop));
            let inbox = session.open_inbox();
            let mut snapshots = inbox.watch();
            loop {
                let snap = snapshots.borrow_and_update().clone();
                println!("[{:?}/{:?}] {} unread", snap.load, snap.connection, snap.unread);
                for n in snap.items {
                    let mark = if n.read { " " } else { "*" };
                    println!("  {mark} {}: {}", n.title, n.message);
                }
                tokio::select! {
                    res = snapshots.changed() => res.context("inbox stopped")?,
                    _ = tokio::signal::ctrl_c() => break,
                }
            }
        }
        Command::Comment { post, text } => {
            let session = Session::connect(user(&opt)?, &opt.host, &opt.relay, config);
            let view = session.open_post(PostId(post.clone()));
            let comment = view
                .add_comment(text)
                .await
                .map_err(|e| anyhow::anyhow!(e.user_message()))?;
            println!("{}", comment.id.0);
        }
        Command::Publish { topic, body } => {
            let body: serde_json::Value =
                serde_json::from_str(body).context("parsing message body as json")?;
            let delivered: usize = reqwest::Client::new()
                .post(format!("{}/api/publish", opt.relay.trim_end_matches('/')))
                .json(&Publish {
                    topic: Topic(topic.clone()),
                    body,
                })
                .bearer_auth(admin_token()?.0)
                .send()
                .await?
                .error_for_status()?
                .json()
                .await
                .context("parsing publish response")?;
            println!("delivered to {delivered} connections");
        }
    }

    Ok(())
}
