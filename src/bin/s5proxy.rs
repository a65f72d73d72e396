use anyhow::{Result, bail};
use clap::Parser;
use s5proxy::{AuthMethod, Config, Socks5Server, UserTable};
use std::time::Duration;
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about = "A lightweight SOCKS5 proxy", long_about = None)]
struct Args {
    /// Listener address
    #[arg(short, long, default_value = "127.0.0.1:1080")]
    listen: String,

    /// Allowed user as NAME:PASS; repeat for more users. Enables
    /// username/password authentication
    #[arg(long = "user", value_name = "NAME:PASS", value_parser = parse_user)]
    users: Vec<(String, String)>,

    /// Username for SOCKS5 proxy
    #[arg(short, long)]
    username: Option<String>,

    /// Password for SOCKS5 proxy
    #[arg(short, long)]
    password: Option<String>,

    /// Outbound dial timeout in seconds, 0 waits indefinitely
    #[arg(short, long, default_value_t = 5)]
    dial_timeout: u64,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn parse_user(s: &str) -> Result<(String, String), String> {
    match s.split_once(':') {
        Some((name, pass)) if !name.is_empty() => Ok((name.to_string(), pass.to_string())),
        _ => Err(format!("expected NAME:PASS, got {s:?}")),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse args
    let args = Args::parse();

    // Initialize tracing subscriber
    let level = if args.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt().with_max_level(level).init();

    // Collect credentials from both flag styles
    let mut users: UserTable = args.users.into_iter().collect();
    match (args.username, args.password) {
        (Some(u), Some(p)) => users.insert(u, p),
        (None, None) => (),
        _ => bail!("must provide both username and password (or neither)"),
    }

    let mut builder = Config::builder().dial_timeout(Duration::from_secs(args.dial_timeout));
    if !users.is_empty() {
        info!("Authentication enabled for {} user(s)", users.len());
        builder = builder
            .auth_method(AuthMethod::UserPass)
            .credential_checker(users);
    }
    let config = builder.build()?;

    // Instantiate server
    let mut server = Socks5Server::new(args.listen).with_config(config);

    // Run it
    info!("Starting SOCKS5 proxy: {}", server.listen_addr);
    server.run().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_user() {
        assert_eq!(
            parse_user("admin:12:34"),
            Ok(("admin".to_string(), "12:34".to_string()))
        );
        assert!(parse_user("admin").is_err());
        assert!(parse_user(":pass").is_err());
    }

    #[test]
    fn test_args() {
        let args = Args::parse_from([
            "s5proxy", "--user", "a:1", "--user", "b:2", "-d", "0", "-l", "0.0.0.0:1081",
        ]);
        assert_eq!(args.users.len(), 2);
        assert_eq!(args.dial_timeout, 0);
        assert_eq!(args.listen, "0.0.0.0:1081");
    }
}
