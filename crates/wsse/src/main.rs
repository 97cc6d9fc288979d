#![forbid(unsafe_code)]

//! wsse CLI: WS-Security operations on SOAP envelope files.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use wsse_core::{algorithm, Error};
use wsse_enc::EncryptionConfig;
use wsse_keys::{loader, CryptoContext};
use wsse_soap::SoapMessage;

#[derive(Parser)]
#[command(
    name = "wsse",
    about = "WS-Security for SOAP envelopes (BinarySecurityToken signing and encryption)",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log at debug level (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign the SOAP Body of an envelope
    Sign {
        /// Input SOAP envelope
        file: PathBuf,

        /// Signer certificate (PEM or DER)
        #[arg(short = 'c', long)]
        cert: PathBuf,

        /// Signer private key (PEM or DER, PKCS#1 or PKCS#8)
        #[arg(short = 'k', long)]
        key: PathBuf,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Verify the signature in an envelope's Security header
    Verify {
        /// Input SOAP envelope
        file: PathBuf,
    },

    /// Encrypt the SOAP Body content for a recipient, optionally signing it
    Encrypt {
        /// Input SOAP envelope
        file: PathBuf,

        /// Recipient certificate (PEM or DER)
        #[arg(short = 'c', long)]
        cert: PathBuf,

        /// Sign after encrypting with this certificate
        #[arg(long = "sign-cert", requires = "sign_key")]
        sign_cert: Option<PathBuf>,

        /// Private key for --sign-cert
        #[arg(long = "sign-key", requires = "sign_cert")]
        sign_key: Option<PathBuf>,

        /// Key transport algorithm URI
        #[arg(long = "key-transport", default_value = algorithm::RSA_PKCS1)]
        key_transport: String,

        /// Content encryption algorithm URI
        #[arg(long = "content-algorithm", default_value = algorithm::AES128_CBC)]
        content_algorithm: String,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Decrypt an envelope with the recipient's key
    Decrypt {
        /// Input SOAP envelope
        file: PathBuf,

        /// Recipient certificate (PEM or DER)
        #[arg(short = 'c', long)]
        cert: PathBuf,

        /// Recipient private key (PEM or DER, PKCS#1 or PKCS#8)
        #[arg(short = 'k', long)]
        key: PathBuf,

        /// Verify the signature before decrypting
        #[arg(long)]
        verify: bool,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Describe an envelope, or list supported algorithms when no file is given
    Info {
        /// Input SOAP envelope
        file: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Sign {
            file,
            cert,
            key,
            output,
        } => cmd_sign(&file, &cert, &key, output),

        Commands::Verify { file } => cmd_verify(&file),

        Commands::Encrypt {
            file,
            cert,
            sign_cert,
            sign_key,
            key_transport,
            content_algorithm,
            output,
        } => {
            let config = EncryptionConfig::new(&key_transport, &content_algorithm);
            let signer = sign_cert.zip(sign_key);
            cmd_encrypt(&file, &cert, signer, &config, output)
        }

        Commands::Decrypt {
            file,
            cert,
            key,
            verify,
            output,
        } => cmd_decrypt(&file, &cert, &key, verify, output),

        Commands::Info { file } => match file {
            Some(file) => cmd_describe(&file),
            None => cmd_info(),
        },
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn cmd_sign(file: &Path, cert: &Path, key: &Path, output: Option<PathBuf>) -> Result<(), Error> {
    let mut message = read_message(file)?;
    let credentials = load_credentials(cert, key)?;
    tracing::info!(file = %file.display(), signer = credentials.certificate.subject(), "signing");
    message.sign(&credentials)?;
    write_output(output, message.to_xml().as_bytes())
}

fn cmd_verify(file: &Path) -> Result<(), Error> {
    let message = read_message(file)?;
    match message.verify() {
        Ok(verified) => {
            println!("OK");
            if let Some(cert) = &verified.certificate {
                println!("Signer: {}", cert.subject());
            }
            println!("Signature method: {}", verified.signature_method);
            println!("References: {}", verified.references.len());
            Ok(())
        }
        Err(e) => {
            eprintln!("INVALID: {e}");
            process::exit(1);
        }
    }
}

fn cmd_encrypt(
    file: &Path,
    cert: &Path,
    signer: Option<(PathBuf, PathBuf)>,
    config: &EncryptionConfig,
    output: Option<PathBuf>,
) -> Result<(), Error> {
    let mut message = read_message(file)?;
    let recipient = loader::load_certificate_file(cert)?;
    tracing::info!(file = %file.display(), recipient = recipient.subject(), "encrypting");

    match signer {
        Some((sign_cert, sign_key)) => {
            let credentials = load_credentials(&sign_cert, &sign_key)?;
            message.encrypt_and_sign(&credentials, &recipient, config)?;
        }
        None => {
            wsse_enc::encrypt(config, message.document_mut(), &recipient)?;
        }
    }
    write_output(output, message.to_xml().as_bytes())
}

fn cmd_decrypt(
    file: &Path,
    cert: &Path,
    key: &Path,
    verify: bool,
    output: Option<PathBuf>,
) -> Result<(), Error> {
    let mut message = read_message(file)?;
    let credentials = load_credentials(cert, key)?;
    tracing::info!(file = %file.display(), verify, "decrypting");

    let refs = if verify {
        message.verify_and_decrypt(&credentials)?
    } else {
        message.decrypt(&credentials)?
    };
    if refs.is_empty() {
        tracing::warn!(file = %file.display(), "no encrypted content found");
    }
    for data_ref in &refs {
        tracing::info!(
            id = %data_ref.id,
            algorithm = %data_ref.algorithm,
            path = data_ref.path.as_deref().unwrap_or("-"),
            "decrypted"
        );
    }
    write_output(output, message.to_xml().as_bytes())
}

fn cmd_describe(file: &Path) -> Result<(), Error> {
    let message = read_message(file)?;
    let doc = message.document();

    let version = match message.version() {
        Some(wsse_soap::SoapVersion::Soap11) => "SOAP 1.1",
        Some(wsse_soap::SoapVersion::Soap12) => "SOAP 1.2",
        None => "unknown",
    };
    println!("Envelope: {version}");
    println!("Body id: {}", message.body_id().unwrap_or("(none)"));

    match wsse_xml::resolve::find_security_header(doc) {
        Some(security_header) => {
            println!("Security header:");
            for block in doc.element_children(security_header) {
                let name = doc
                    .element(block)
                    .map(|e| e.name.qualified())
                    .unwrap_or_default();
                match wsse_xml::resolve::element_ids(doc, block).next() {
                    Some(id) => println!("  {name} ({id})"),
                    None => println!("  {name}"),
                }
            }
        }
        None => println!("Security header: (none)"),
    }
    Ok(())
}

fn cmd_info() -> Result<(), Error> {
    println!("wsse: WS-Security for SOAP clients");
    println!();
    println!("Token reference:");
    println!("  BinarySecurityToken (X.509 v3, Base64Binary), direct reference");
    println!();
    println!("Canonicalization:");
    println!("  {}", algorithm::EXC_C14N);
    println!();
    println!("Digest algorithms:");
    println!("  {}", algorithm::SHA1);
    println!("  {}", algorithm::SHA256);
    println!();
    println!("Signature algorithms:");
    println!("  {}", algorithm::RSA_SHA1);
    println!("  {}", algorithm::RSA_SHA256);
    println!("  {}", algorithm::DSA_SHA1);
    println!();
    println!("Content encryption:");
    for uri in [
        algorithm::AES128_CBC,
        algorithm::AES192_CBC,
        algorithm::AES256_CBC,
        algorithm::AES128_GCM,
        algorithm::AES192_GCM,
        algorithm::AES256_GCM,
    ] {
        println!("  {uri}");
    }
    println!();
    println!("Key transport:");
    println!("  {}", algorithm::RSA_PKCS1);
    println!("  {}", algorithm::RSA_OAEP);
    Ok(())
}

// ── Utility functions ────────────────────────────────────────────────

fn read_message(path: &Path) -> Result<SoapMessage, Error> {
    let xml = std::fs::read_to_string(path)
        .map_err(|e| Error::MalformedInput(format!("{}: {e}", path.display())))?;
    SoapMessage::parse(&xml)
}

fn load_credentials(cert: &Path, key: &Path) -> Result<CryptoContext, Error> {
    let certificate = loader::load_certificate_file(cert)?;
    let private_key = loader::load_private_key_file(key)?;
    Ok(CryptoContext::from_certificate(certificate).with_private_key(private_key))
}

fn write_output(path: Option<PathBuf>, data: &[u8]) -> Result<(), Error> {
    match path {
        Some(p) => std::fs::write(&p, data)?,
        None => {
            use std::io::Write;
            std::io::stdout().write_all(data)?;
        }
    }
    Ok(())
}
