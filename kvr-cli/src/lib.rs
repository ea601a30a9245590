use std::io::Read;

use anyhow::{Context, bail};
use clap_stdin::FileOrStdin;
use futures_util::{SinkExt, StreamExt};
use kvr_router::protocol::{Response, StatusResponse};
use serde_json::{Value, json};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::debug;

#[derive(clap::Parser, Debug)]
#[clap(author, version, about, long_about = None)]
pub struct KvrCli {
    #[command(subcommand)]
    pub command: KvrCommands,
    #[clap(flatten)]
    pub conn: ConnectionArgs,
}

#[derive(clap::Args, Clone, Debug)]
pub struct ConnectionArgs {
    /// Router websocket URL
    #[arg(short, long, default_value = "ws://127.0.0.1:3000/ws")]
    pub url: String,
}

#[derive(clap::Subcommand, Debug)]
pub enum KvrCommands {
    /// Read the value stored under a key
    #[clap(aliases = &["g"])]
    Get {
        /// Object key
        id: String,
    },
    /// Store a value under a key
    #[clap(aliases = &["p", "set"])]
    Put {
        /// Object key
        id: String,
        /// Value, stored verbatim
        #[arg(required_unless_present = "payload", conflicts_with = "payload")]
        data: Option<String>,
        /// Read the value from a file, or from stdin with `-`. One trailing
        /// newline is dropped. Example: `echo v | kvr-cli put k -f -`
        #[arg(short = 'f', long = "file")]
        payload: Option<FileOrStdin>,
    },
    /// Send a request object as-is and print whatever comes back
    Raw {
        /// Request JSON, e.g. '{"type":"GET","id":"k"}'
        json: String,
    },
}

impl KvrCommands {
    fn request(&self) -> anyhow::Result<String> {
        let req = match self {
            KvrCommands::Get { id } => json!({"type": "GET", "id": id}),
            KvrCommands::Put { id, data, payload } => {
                let data = match (data, payload) {
                    (Some(data), _) => data.clone(),
                    (None, Some(payload)) => read_payload(payload)?,
                    (None, None) => bail!("no value given"),
                };
                json!({"type": "PUT", "id": id, "data": data})
            }
            KvrCommands::Raw { json } => return Ok(json.clone()),
        };
        Ok(req.to_string())
    }
}

fn read_payload(payload: &FileOrStdin) -> anyhow::Result<String> {
    let mut data = String::new();
    payload
        .clone()
        .into_reader()?
        .read_to_string(&mut data)
        .context("cannot read value")?;
    if data.ends_with('\n') {
        data.pop();
    }
    Ok(data)
}

pub async fn run(cli: KvrCli) -> anyhow::Result<()> {
    let (mut ws, _) = connect_async(cli.conn.url.as_str())
        .await
        .with_context(|| format!("cannot connect to {}", cli.conn.url))?;
    let req = cli.command.request()?;
    debug!("send {}", req);
    ws.send(Message::text(req)).await?;

    let reply = loop {
        match ws.next().await {
            Some(Ok(Message::Text(text))) => break text.as_str().to_string(),
            Some(Ok(Message::Binary(data))) => {
                break String::from_utf8_lossy(&data).into_owned();
            }
            Some(Ok(Message::Close(_))) | None => {
                bail!("connection closed before a response arrived")
            }
            Some(Ok(_)) => continue,
            Some(Err(e)) => return Err(e.into()),
        }
    };
    let _ = ws.close(None).await;

    if let KvrCommands::Raw { .. } = cli.command {
        let value: Value = serde_json::from_str(&reply)?;
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }
    match serde_json::from_str::<Response>(&reply)? {
        Response::Data { data } => println!("{}", data),
        Response::Status(StatusResponse { code, message }) if code < 400 => {
            println!("{}", message)
        }
        Response::Status(StatusResponse { code, message }) => {
            bail!("router returned {}: {}", code, message)
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    fn request_of(args: &[&str]) -> Value {
        let cli = KvrCli::parse_from(args);
        serde_json::from_str(&cli.command.request().unwrap()).unwrap()
    }

    #[test]
    fn builds_requests() {
        let cli = KvrCli::parse_from(["kvr-cli", "get", "k1"]);
        assert_eq!(cli.conn.url, "ws://127.0.0.1:3000/ws");
        assert_eq!(
            request_of(&["kvr-cli", "get", "k1"]),
            json!({"type": "GET", "id": "k1"})
        );

        let cli =
            KvrCli::parse_from(["kvr-cli", "-u", "ws://h:1/ws", "put", "k1", "v1"]);
        assert_eq!(cli.conn.url, "ws://h:1/ws");
        assert_eq!(
            request_of(&["kvr-cli", "put", "k1", "v1"]),
            json!({"type": "PUT", "id": "k1", "data": "v1"})
        );
    }

    #[test]
    fn positional_value_is_kept_verbatim() {
        assert_eq!(
            request_of(&["kvr-cli", "put", "k1", "v1\n"]),
            json!({"type": "PUT", "id": "k1", "data": "v1\n"})
        );
    }

    #[test]
    fn file_value_drops_trailing_newline() {
        let path = std::env::temp_dir()
            .join(format!("kvr-cli-value-{}.txt", std::process::id()));
        std::fs::write(&path, "line one\nline two\n").unwrap();
        let req = request_of(&[
            "kvr-cli",
            "put",
            "k1",
            "--file",
            path.to_str().unwrap(),
        ]);
        std::fs::remove_file(&path).unwrap();
        assert_eq!(
            req,
            json!({"type": "PUT", "id": "k1", "data": "line one\nline two"})
        );
    }

    #[test]
    fn put_needs_exactly_one_value_source() {
        assert!(KvrCli::try_parse_from(["kvr-cli", "put", "k1"]).is_err());
        assert!(
            KvrCli::try_parse_from(["kvr-cli", "put", "k1", "v1", "-f", "-"])
                .is_err()
        );
    }
}
