//! Entry point for the paneltop TUI. Parses args, resolves the connection
//! profile and runs the App.

use std::io::{self, Write};

use clap::Parser;

use paneltop::app::{App, AppConfig};
use paneltop::logging;
use paneltop::profiles::{
    load_profiles, save_profiles, server_key_for, ProfileEntry, ProfileRequest, ResolveProfile,
};
use paneltop::store::KeyedStore;
use paneltop::ws::ConnectConfig;

#[derive(Debug, Parser)]
#[command(name = "paneltop", version, about = "Live game-server console and resource graphs")]
struct Cli {
    /// Daemon websocket URL (ws://HOST:PORT/api/servers/ID/ws or wss://...)
    url: Option<String>,

    /// Token sent in the `auth` frame after connecting
    #[arg(short = 'k', long, env = "PANELTOP_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// PEM file with the CA certificate used to verify the daemon
    #[arg(short = 't', long = "tls-ca", value_name = "CERT_PEM")]
    tls_ca: Option<String>,

    /// Origin header sent with the websocket handshake
    #[arg(long)]
    origin: Option<String>,

    /// Key the command history is stored under (defaults to the server id in the URL)
    #[arg(short = 's', long)]
    server: Option<String>,

    /// Connection profile to load or create
    #[arg(short = 'P', long, value_name = "NAME")]
    profile: Option<String>,

    /// Overwrite an existing profile without asking
    #[arg(long)]
    save: bool,

    /// CPU limit in percent (100 per core)
    #[arg(long, value_name = "PERCENT")]
    cpu_limit: Option<f64>,

    /// Memory limit in MiB
    #[arg(long, value_name = "MIB")]
    memory_limit: Option<u64>,

    /// Disk limit in MiB
    #[arg(long, value_name = "MIB")]
    disk_limit: Option<u64>,

    /// Address shown in the details row
    #[arg(long)]
    address: Option<String>,

    /// Resolve (and persist) the profile, then exit without connecting
    #[arg(long)]
    dry_run: bool,
}

impl Cli {
    fn entry(&self) -> Option<ProfileEntry> {
        let url = self.url.clone()?;
        let mut entry = ProfileEntry {
            url,
            token: self.token.clone(),
            tls_ca: self.tls_ca.clone(),
            origin: self.origin.clone(),
            server: self.server.clone(),
            address: self.address.clone(),
            ..Default::default()
        };
        self.apply_limits(&mut entry);
        Some(entry)
    }

    fn apply_limits(&self, entry: &mut ProfileEntry) {
        if self.cpu_limit.is_some() {
            entry.limits.cpu = self.cpu_limit;
        }
        if self.memory_limit.is_some() {
            entry.limits.memory_mib = self.memory_limit;
        }
        if self.disk_limit.is_some() {
            entry.limits.disk_mib = self.disk_limit;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Err(e) = logging::init() {
        eprintln!("logging disabled: {e:#}");
    }

    let Some(entry) = resolve_entry(&cli)? else {
        return Ok(());
    };

    if cli.dry_run {
        println!("url: {}", entry.url);
        println!("server: {}", history_key_of(&entry));
        return Ok(());
    }

    // Both rustls backends can end up enabled through features; pick one
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

    let config = AppConfig {
        server_key: history_key_of(&entry),
        address: entry
            .address
            .clone()
            .unwrap_or_else(|| address_of(&entry.url)),
        limits: entry.limits,
        connect: ConnectConfig {
            url: entry.url,
            token: entry.token,
            tls_ca: entry.tls_ca,
            origin: entry.origin,
        },
    };
    tracing::info!(server = %config.server_key, url = %config.connect.url, "starting");

    let mut app = App::new(config, KeyedStore::open_default());
    app.run().await
}

fn history_key_of(entry: &ProfileEntry) -> String {
    entry
        .server
        .clone()
        .unwrap_or_else(|| server_key_for(&entry.url))
}

fn address_of(url: &str) -> String {
    match url::Url::parse(url) {
        Ok(u) => match (u.host_str(), u.port()) {
            (Some(h), Some(p)) => format!("{h}:{p}"),
            (Some(h), None) => h.to_string(),
            _ => url.to_string(),
        },
        Err(_) => url.to_string(),
    }
}

/// Work out the connection settings from flags and profiles, persisting new or
/// changed profiles along the way. `None` means the user aborted.
fn resolve_entry(cli: &Cli) -> anyhow::Result<Option<ProfileEntry>> {
    let profiles_file = load_profiles();
    let req = ProfileRequest {
        profile_name: cli.profile.clone(),
        entry: cli.entry(),
    };
    let mut profiles_mut = profiles_file.clone();

    let entry = match req.resolve(&profiles_file) {
        ResolveProfile::Direct(entry) => {
            if let Some(name) = cli.profile.as_ref() {
                match profiles_mut.profiles.get(name) {
                    None => {
                        // New profile: save on first use
                        profiles_mut.profiles.insert(name.clone(), entry.clone());
                        persist(&profiles_mut);
                    }
                    Some(existing) if *existing != entry => {
                        let overwrite = cli.save
                            || prompt_yes_no(&format!(
                                "Overwrite existing profile '{name}'? [y/N]: "
                            ));
                        if overwrite {
                            profiles_mut.profiles.insert(name.clone(), entry.clone());
                            persist(&profiles_mut);
                        }
                    }
                    Some(_) => {}
                }
            }
            entry
        }
        ResolveProfile::Loaded(mut entry) => {
            // One-off overrides; the stored profile is left alone
            if cli.token.is_some() {
                entry.token = cli.token.clone();
            }
            cli.apply_limits(&mut entry);
            entry
        }
        ResolveProfile::PromptSelect(names) => {
            eprintln!("Select profile:");
            for (i, n) in names.iter().enumerate() {
                eprintln!("  {}. {}", i + 1, n);
            }
            let line = prompt_string("Enter number (or blank to abort): ")?;
            let picked = line
                .trim()
                .parse::<usize>()
                .ok()
                .and_then(|idx| idx.checked_sub(1))
                .and_then(|idx| names.get(idx))
                .and_then(|name| profiles_mut.profiles.get(name));
            match picked {
                Some(entry) => entry.clone(),
                None => return Ok(None),
            }
        }
        ResolveProfile::PromptCreate(name) => {
            eprintln!("Profile '{name}' does not exist yet.");
            let url = prompt_string("Enter URL (ws://HOST:PORT/api/servers/ID/ws or wss://...): ")?;
            if url.trim().is_empty() {
                return Ok(None);
            }
            let token = non_empty(prompt_string("Enter token (or leave blank): ")?);
            let tls_ca = non_empty(prompt_string("Enter TLS CA path (or leave blank): ")?);
            let mut entry = ProfileEntry {
                url: url.trim().to_string(),
                token,
                tls_ca,
                origin: cli.origin.clone(),
                server: cli.server.clone(),
                address: cli.address.clone(),
                ..Default::default()
            };
            cli.apply_limits(&mut entry);
            profiles_mut.profiles.insert(name, entry.clone());
            persist(&profiles_mut);
            entry
        }
        ResolveProfile::None => {
            eprintln!("No URL provided and no profiles to select.");
            return Ok(None);
        }
    };
    Ok(Some(entry))
}

fn persist(profiles: &paneltop::profiles::ProfilesFile) {
    if let Err(e) = save_profiles(profiles) {
        tracing::warn!(error = %e, "could not save profiles");
        eprintln!("warning: could not save profiles: {e}");
    }
}

fn non_empty(s: String) -> Option<String> {
    let s = s.trim();
    (!s.is_empty()).then(|| s.to_string())
}

fn prompt_yes_no(prompt: &str) -> bool {
    eprint!("{prompt}");
    let _ = io::stderr().flush();
    let mut line = String::new();
    if io::stdin().read_line(&mut line).is_ok() {
        matches!(line.trim().to_ascii_lowercase().as_str(), "y" | "yes")
    } else {
        false
    }
}

fn prompt_string(prompt: &str) -> io::Result<String> {
    eprint!("{prompt}");
    let _ = io::stderr().flush();
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line)
}
