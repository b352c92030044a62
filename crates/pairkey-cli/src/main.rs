//! Pairkey CLI
//!
//! Thin wrapper around pairkey-core for command-line usage. All key files
//! live in the directory given by `--dir` (default: current directory).
//!
//! ## Usage
//!
//! ```bash
//! # Generate identities (writes <name>.key, <name>.pub, <name>.salt)
//! pairkey genkey alice
//! pairkey genkey bob
//!
//! # Derive the shared key (writes alice_bob.skey)
//! pairkey genshared alice bob
//!
//! # Seal and open payloads (stdin -> stdout)
//! echo -n "hello world" | pairkey encrypt alice_bob.skey > msg.bin
//! pairkey decrypt bob_alice.skey < msg.bin
//!
//! # Same, with a trailing 00 00 end marker for stream transports
//! echo -n "hello world" | pairkey encrypt --framed alice_bob.skey > msg.bin
//! pairkey decrypt --framed bob_alice.skey < msg.bin
//!
//! # Sign and verify request components
//! pairkey sign alice_bob.skey GET /media/0 test
//! pairkey verify bob_alice.skey <mac> GET /media/0 test
//!
//! # Store a counterpart's public record received out of band
//! pairkey import carol carol.pub carol.salt
//!
//! # Print a stored public record
//! pairkey show alice
//! ```

use std::ffi::OsString;
use std::io::{Read, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::{CommandFactory, Parser, Subcommand};
use pairkey_core::{parse_mac, MessageComponents, PairingEngine};

/// Pairkey - pairwise key agreement, envelope encryption and request signing
#[derive(Parser)]
#[command(name = "pairkey")]
#[command(version = "0.1.0")]
#[command(about = "Pairkey - pairwise key agreement and envelope encryption")]
#[command(
    long_about = "Derive a symmetric key shared by two peers from static X25519 key pairs and exchanged salts, then use it to encrypt payloads and authenticate requests."
)]
#[command(allow_external_subcommands = true)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Key directory
    #[arg(short, long, global = true, default_value = ".")]
    dir: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a key pair and salt for <name>
    Genkey {
        /// Identity name
        name: String,
    },

    /// Derive the key shared by <me> and <peer>, written to <me>_<peer>.skey
    Genshared {
        /// Local identity (needs <me>.key and <me>.salt)
        me: String,
        /// Counterpart (needs <peer>.pub and <peer>.salt)
        peer: String,
    },

    /// Encrypt stdin to stdout
    Encrypt {
        /// Shared key file
        keyfile: PathBuf,
        /// Append the 00 00 end marker, escaping zeros in the envelope
        #[arg(long)]
        framed: bool,
    },

    /// Decrypt stdin to stdout
    Decrypt {
        /// Shared key file
        keyfile: PathBuf,
        /// Input carries the 00 00 end marker
        #[arg(long)]
        framed: bool,
    },

    /// Print the base64 MAC of request components
    Sign {
        /// Shared key file
        keyfile: PathBuf,
        /// Request components in order (default: GET /media/0 test)
        components: Vec<String>,
    },

    /// Check a base64 MAC over request components
    Verify {
        /// Shared key file
        keyfile: PathBuf,
        /// MAC as printed by `sign` (base64)
        mac: String,
        /// Request components in order (default: GET /media/0 test)
        components: Vec<String>,
    },

    /// Store a counterpart's public key and salt under <name>
    Import {
        /// Name to store the record under
        name: String,
        /// Raw 32-byte public key file
        pubfile: PathBuf,
        /// Raw salt file
        saltfile: PathBuf,
    },

    /// Show the public key and salt stored under <name>
    Show {
        /// Identity name
        name: String,
    },

    #[command(external_subcommand)]
    Unknown(Vec<OsString>),
}

fn setup_logging(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn print_usage() -> Result<()> {
    Cli::command().print_help()?;
    println!();
    Ok(())
}

/// First token that is not the program name or a global option.
fn leading_token(args: &[OsString]) -> Option<&OsString> {
    let mut iter = args.iter().skip(1);
    while let Some(arg) = iter.next() {
        let text = arg.to_string_lossy();
        match &*text {
            "-d" | "--dir" => {
                iter.next();
            }
            "--verbose" => {}
            t if t.starts_with("--dir=") => {}
            t if t.starts_with("-d") && t.len() > 2 => {}
            t if t.len() > 1 && t.starts_with('-') && t[1..].chars().all(|c| c == 'v') => {}
            _ => return Some(arg),
        }
    }
    None
}

/// An unrecognised flag in place of the command shows usage rather than
/// failing; unknown flags after a command are still errors.
fn is_unknown_leading_flag(err: &clap::Error, args: &[OsString]) -> bool {
    err.kind() == ErrorKind::UnknownArgument
        && leading_token(args).is_some_and(|arg| arg.to_string_lossy().starts_with('-'))
}

fn components_or_demo(components: Vec<String>) -> MessageComponents {
    if components.is_empty() {
        MessageComponents::demo()
    } else {
        components.into_iter().collect()
    }
}

fn read_stdin() -> Result<Vec<u8>> {
    let mut input = Vec::new();
    std::io::stdin()
        .read_to_end(&mut input)
        .context("Failed to read stdin")?;
    Ok(input)
}

fn write_stdout(bytes: &[u8]) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(bytes)?;
    stdout.flush()?;
    Ok(())
}

fn main() -> Result<()> {
    let args: Vec<OsString> = std::env::args_os().collect();
    let cli = match Cli::try_parse_from(&args) {
        Ok(cli) => cli,
        Err(err) if is_unknown_leading_flag(&err, &args) => return print_usage(),
        Err(err) => err.exit(),
    };

    setup_logging(cli.verbose);

    let engine = PairingEngine::new(&cli.dir);

    let Some(command) = cli.command else {
        return print_usage();
    };

    match command {
        Commands::Genkey { name } => {
            let record = engine.genkey(&name)?;
            println!("Generated identity '{}'", name);
            println!("  Public key: {}", record.public_key.to_hex());
            println!("  Fingerprint: {}", record.public_key.fingerprint());
        }

        Commands::Genshared { me, peer } => {
            let path = engine.genshared(&me, &peer)?;
            println!("Shared key written to {}", path.display());
        }

        Commands::Encrypt { keyfile, framed } => {
            let plaintext = read_stdin()?;
            let envelope = if framed {
                engine.encrypt_framed(&keyfile, &plaintext)?
            } else {
                engine.encrypt(&keyfile, &plaintext)?
            };
            write_stdout(&envelope)?;
        }

        Commands::Decrypt { keyfile, framed } => {
            let input = read_stdin()?;
            let plaintext = if framed {
                engine.decrypt_framed(&keyfile, &input)
            } else {
                engine.decrypt(&keyfile, &input)
            }
            .context("Decryption failed")?;
            write_stdout(&plaintext)?;
        }

        Commands::Sign {
            keyfile,
            components,
        } => {
            let mac = engine.sign(&keyfile, &components_or_demo(components))?;
            println!("{}", mac.to_base64());
        }

        Commands::Verify {
            keyfile,
            mac,
            components,
        } => {
            let mac = parse_mac(mac.as_bytes())?;
            engine
                .verify(&keyfile, &components_or_demo(components), &mac)
                .context("Verification failed")?;
            println!("OK");
        }

        Commands::Import {
            name,
            pubfile,
            saltfile,
        } => {
            let public_key = std::fs::read(&pubfile)
                .with_context(|| format!("Failed to read {}", pubfile.display()))?;
            let salt = std::fs::read(&saltfile)
                .with_context(|| format!("Failed to read {}", saltfile.display()))?;

            let record = engine.import(&name, &public_key, &salt)?;
            println!("Imported '{}' ({})", name, record.public_key.fingerprint());
        }

        Commands::Show { name } => {
            let record = engine.show(&name)?;
            println!("Identity: {}", name);
            println!("  Public key:  {}", record.public_key.to_hex());
            println!("  Fingerprint: {}", record.public_key.fingerprint());
            println!("  Salt:        {}", record.salt.to_hex());
            if !engine.has_identity(&name)? {
                println!("  (imported; no local key pair)");
            }
        }

        Commands::Unknown(_) => print_usage()?,
    }

    Ok(())
}
