//! gencert CLI application.
//!
//! This binary issues TLS server certificates and verifies them against a
//! trusted root.

use clap::{Parser, Subcommand};
use gencert::cert::options::{
    with_atomic_write, with_ca, with_cert_file_name, with_duration, with_ecdsa_curve,
    with_ed25519, with_key_file_name, with_rsa_bits, with_sign_by_parent, with_start_date,
    IssueOption, DEFAULT_CERT_FILE_NAME, DEFAULT_KEY_FILE_NAME, DEFAULT_RSA_BITS,
};
use gencert::error::Result;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "gencert")]
#[command(about = "Generate self-signed or CA-signed TLS server certificates", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a certificate and private key
    Generate {
        /// Comma-separated host names and IP addresses
        #[arg(long)]
        host: String,

        /// Output directory (default: current directory)
        #[arg(long, default_value = ".")]
        dest: PathBuf,

        /// Certificate file name
        #[arg(long, default_value = DEFAULT_CERT_FILE_NAME)]
        cert_file: String,

        /// Private key file name
        #[arg(long, default_value = DEFAULT_KEY_FILE_NAME)]
        key_file: String,

        /// Parent certificate to sign with
        #[arg(long, requires = "parent_key")]
        parent_cert: Option<PathBuf>,

        /// Parent PKCS#8 private key
        #[arg(long, requires = "parent_cert")]
        parent_key: Option<PathBuf>,

        /// Validity start, e.g. "Jan 1 15:04:05 2011" (default: now)
        #[arg(long)]
        start_date: Option<String>,

        /// Validity period in hours
        #[arg(long, default_value = "8760", allow_negative_numbers = true)]
        valid_for_hours: i64,

        /// Make the certificate its own certificate authority
        #[arg(long)]
        ca: bool,

        /// RSA key size when no other algorithm is selected
        #[arg(long, default_value_t = DEFAULT_RSA_BITS)]
        rsa_bits: usize,

        /// ECDSA curve: P224, P256, P384 or P521
        #[arg(long)]
        ecdsa_curve: Option<String>,

        /// Generate an Ed25519 key
        #[arg(long)]
        ed25519: bool,

        /// Stage files and rename them into place
        #[arg(long)]
        atomic: bool,
    },

    /// Verify a certificate against a trusted root
    Verify {
        /// Trusted root certificate
        #[arg(long)]
        root: PathBuf,

        /// Certificate to verify
        #[arg(long)]
        cert: PathBuf,

        /// Host name or IP address the certificate must be valid for
        #[arg(long)]
        dns_name: String,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Generate {
            host,
            dest,
            cert_file,
            key_file,
            parent_cert,
            parent_key,
            start_date,
            valid_for_hours,
            ca,
            rsa_bits,
            ecdsa_curve,
            ed25519,
            atomic,
        } => {
            let mut options: Vec<IssueOption> = vec![
                with_cert_file_name(cert_file),
                with_key_file_name(key_file),
                with_duration(time::Duration::hours(valid_for_hours)),
                with_rsa_bits(rsa_bits),
            ];
            if let (Some(cert), Some(key)) = (parent_cert, parent_key) {
                options.push(with_sign_by_parent(cert, key));
            }
            if let Some(date) = start_date {
                options.push(with_start_date(date));
            }
            if let Some(curve) = ecdsa_curve {
                options.push(with_ecdsa_curve(curve));
            }
            if ed25519 {
                options.push(with_ed25519());
            }
            if ca {
                options.push(with_ca());
            }
            if atomic {
                options.push(with_atomic_write());
            }

            let issued = gencert::issue(&host, &dest, options)?;

            println!("✓ Generated {} certificate", issued.key_algorithm);
            if let Some(artifacts) = &issued.artifacts {
                println!("  Certificate: {}", artifacts.cert_path.display());
                println!("  Private key: {}", artifacts.key_path.display());
            }
            println!("  Serial: {}", issued.serial_hex());
            println!("  Valid: {} to {}", issued.not_before, issued.not_after);
            Ok(())
        }

        Commands::Verify {
            root,
            cert,
            dns_name,
        } => {
            gencert::verify(&root, &cert, &dns_name)?;
            println!("✓ {} is valid for {}", cert.display(), dns_name);
            Ok(())
        }
    }
}
