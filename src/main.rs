//! acme-challenger command line.
//!
//! Starts the challenge responders and the shutdown listener, runs one
//! issuance, presents the certificate over TLS and waits for
//! `GET /shutdown` (or Ctrl-C).
use std::fs;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::process;
use std::time::Duration;

use clap::Parser;
use log::{error, info};
use tokio::runtime::Runtime;

use acme_challenger::present::CertificateServer;
use acme_challenger::responder::{token_channel, DnsResponder, HttpResponder};
use acme_challenger::shutdown::{ShutdownListener, Supervisor};
use acme_challenger::{
    ChallengeSinks, ChallengeType, Config, Exhaustion, Issuer, KeyPair, Result, TrustAnchors,
};

/// ACME client answering its own dns-01/http-01 challenges
#[derive(Parser, Debug)]
#[command(name = "acme-challenger")]
#[command(version, about, long_about = None)]
struct Args {
    /// Challenge type to answer
    #[arg(value_enum, env = "ACME_CHALLENGE")]
    challenge: ChallengeType,

    /// ACME directory URL
    #[arg(long = "dir", env = "ACME_DIR")]
    dir: String,

    /// IPv4 address the DNS responder answers A queries with
    #[arg(long = "record", env = "ACME_RECORD")]
    record: Ipv4Addr,

    /// Domain of the certificate, repeat for more. The first is the CN
    #[arg(long = "domain", env = "ACME_DOMAIN", value_delimiter = ',', required = true)]
    domains: Vec<String>,

    /// Account contact, e.g. mailto:admin@example.com
    #[arg(long = "contact", env = "ACME_CONTACT", value_delimiter = ',')]
    contact: Vec<String>,

    /// Revoke the certificate right after it is issued
    #[arg(long = "revoke", env = "ACME_REVOKE")]
    revoke: bool,

    /// PEM file with the roots to trust for the ACME server
    #[arg(long = "trust-anchors", env = "ACME_TRUST_ANCHORS")]
    trust_anchors: Option<PathBuf>,

    /// Save certificate and key to this directory
    #[arg(long = "save-dir", env = "ACME_SAVE_DIR")]
    save_dir: Option<PathBuf>,

    /// PEM file with an existing account key
    #[arg(long = "account-key", env = "ACME_ACCOUNT_KEY")]
    account_key: Option<PathBuf>,

    /// Carry on when a challenge is not confirmed valid in time
    #[arg(long = "continue-unconfirmed", env = "ACME_CONTINUE_UNCONFIRMED")]
    continue_unconfirmed: bool,

    /// Seconds to wait for a finalized order to become valid
    #[arg(long = "order-deadline", env = "ACME_ORDER_DEADLINE")]
    order_deadline: Option<u64>,

    /// DNS responder address [default: 0.0.0.0:10053]
    #[arg(long = "dns-addr", env = "ACME_DNS_ADDR")]
    dns_addr: Option<SocketAddr>,

    /// http-01 responder address [default: 0.0.0.0:5002]
    #[arg(long = "http-addr", env = "ACME_HTTP_ADDR")]
    http_addr: Option<SocketAddr>,

    /// Certificate presentation address [default: 0.0.0.0:5001]
    #[arg(long = "tls-addr", env = "ACME_TLS_ADDR")]
    tls_addr: Option<SocketAddr>,

    /// Shutdown listener address [default: 0.0.0.0:5003]
    #[arg(long = "shutdown-addr", env = "ACME_SHUTDOWN_ADDR")]
    shutdown_addr: Option<SocketAddr>,
}

impl Args {
    fn into_config(self) -> Config {
        let mut config = Config {
            directory_url: self.dir,
            challenge: self.challenge,
            domains: self.domains,
            contact: self.contact,
            record: self.record,
            revoke: self.revoke,
            trust_anchors: self.trust_anchors,
            save_dir: self.save_dir,
            ..Default::default()
        };
        if self.continue_unconfirmed {
            config.challenge_polling.on_exhausted = Exhaustion::Continue;
        }
        if let Some(secs) = self.order_deadline {
            config.order_polling.deadline = Duration::from_secs(secs);
        }
        if let Some(addr) = self.dns_addr {
            config.dns_addr = addr;
        }
        if let Some(addr) = self.http_addr {
            config.http_addr = addr;
        }
        if let Some(addr) = self.tls_addr {
            config.tls_addr = addr;
        }
        if let Some(addr) = self.shutdown_addr {
            config.shutdown_addr = addr;
        }
        config
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut args = Args::parse();
    let account_key = args.account_key.take();
    let config = args.into_config();

    if let Err(e) = run(config, account_key) {
        error!("acme-challenger failed: {}", e);
        process::exit(1);
    }
}

fn run(config: Config, account_key: Option<PathBuf>) -> Result<()> {
    let trust_anchors = match &config.trust_anchors {
        Some(path) => TrustAnchors::from_pem_file(path)?,
        None => TrustAnchors::default(),
    };
    let account_key = match account_key {
        Some(path) => Some(KeyPair::from_pem(&fs::read(path)?)?),
        None => None,
    };

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let mut supervisor = Supervisor::new(rt.handle().clone());

    match issue_and_present(&rt, &mut supervisor, &config, trust_anchors, account_key) {
        Ok(()) => {
            info!("Waiting for shutdown request");
            rt.block_on(supervisor.run_until_shutdown(config.drain_timeout));
            Ok(())
        }
        Err(e) => {
            rt.block_on(supervisor.stop_all(config.drain_timeout));
            Err(e)
        }
    }
}

fn issue_and_present(
    rt: &Runtime,
    supervisor: &mut Supervisor,
    config: &Config,
    trust_anchors: TrustAnchors,
    account_key: Option<KeyPair>,
) -> Result<()> {
    let listener = rt.block_on(ShutdownListener::bind(config.shutdown_addr, supervisor.signal()))?;
    supervisor.spawn("shutdown listener", move |stop| listener.serve(stop));

    let (dns_tx, dns_inbox) = token_channel();
    let dns = rt.block_on(DnsResponder::bind(config.dns_addr, config.record))?;
    supervisor.spawn("dns-01 responder", move |stop| dns.serve(dns_inbox, stop));

    let (http_tx, http_inbox) = token_channel();
    let http = rt.block_on(HttpResponder::bind(config.http_addr))?;
    supervisor.spawn("http-01 responder", move |stop| http.serve(http_inbox, stop));

    let sinks = ChallengeSinks {
        dns: Some(dns_tx),
        http: Some(http_tx),
    };
    let mut issuer = Issuer::new(config.clone(), trust_anchors, sinks);
    if let Some(key) = account_key {
        issuer = issuer.with_account_key(key);
    }

    // blocking, on this thread and outside the runtime
    let cert = issuer.run()?;
    info!(
        "Certificate for {} issued, {} days left",
        config.domains[0],
        cert.valid_days_left()?
    );

    let server = rt.block_on(CertificateServer::bind(config.tls_addr, &cert))?;
    supervisor.spawn("certificate server", move |stop| server.serve(stop));
    Ok(())
}
