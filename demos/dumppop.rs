use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use popfree::mailbox::MailboxPaths;
use popfree::mime::{ExtensionMap, MimeParser};
use popfree::supervisor::MailSupervisor;
use popfree::sync::SyncOptions;
use popfree::worker::MimeFileWorker;
use popfree::{AuthMethod, ClientBuilder, Credentials, TlsMode, TlsProtocol};

/// Drain a POP3 mailbox into a directory and extract every message.
///
/// Messages are queued in `<directory>/queue`, extracted into `<directory>/processed/<uid>/`,
/// and set aside in `<directory>/badmail` when they cannot be decoded.
#[derive(Debug, Parser)]
#[command(version)]
struct Args {
    /// Directory holding the queue, badmail and processed folders.
    directory: PathBuf,

    /// POP3 server host name.
    #[arg(long)]
    host: String,

    /// Server port. Defaults to 995 with TLS on connect and 110 otherwise.
    #[arg(long)]
    port: Option<u16>,

    #[arg(long, short)]
    username: String,

    #[arg(long, short, env = "POP_PASSWORD", hide_env_values = true)]
    password: String,

    /// TLS protocol: none, default, tls10, tls11 or tls12.
    #[arg(long, default_value = "none")]
    tls: TlsProtocol,

    /// When to negotiate TLS: connect or starttls.
    #[arg(long, default_value = "connect")]
    mode: TlsMode,

    /// Authentication method: auto, userpass or apop.
    #[arg(long, default_value = "auto")]
    auth: AuthMethod,

    /// Initial socket timeout in seconds.
    #[arg(long, default_value_t = 60)]
    timeout: u64,

    /// Accept invalid server certificates.
    #[arg(long)]
    accept_invalid_certs: bool,

    /// Extraction threads, 0 for one per CPU.
    #[arg(long, default_value_t = 0)]
    threads: usize,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    match run(args) {
        Ok(total) => {
            println!("Done. {} message(s) processed.", total);
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> popfree::Result<u32> {
    let port = args.port.unwrap_or(match (args.tls, args.mode) {
        (TlsProtocol::None, _) | (_, TlsMode::StartTls) => popfree::POP3_PORT,
        _ => popfree::POP3S_PORT,
    });
    let mut builder = ClientBuilder::new(args.host, port);
    builder
        .tls(args.tls)
        .mode(args.mode)
        .danger_accept_invalid_certs(args.accept_invalid_certs);

    let paths = MailboxPaths::create(&args.directory)?;
    let worker = MimeFileWorker::new(paths, MimeParser::new(), ExtensionMap::standard());
    let credentials = Credentials::new(args.username, args.password).method(args.auth);

    let mut supervisor = MailSupervisor::new(builder, credentials, worker);
    supervisor
        .threads(args.threads)
        .options(SyncOptions {
            timeout: Duration::from_secs(args.timeout),
            ..SyncOptions::default()
        });
    supervisor.run()
}
