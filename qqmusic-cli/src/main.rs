use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use clap::{Parser, Subcommand, ValueEnum};
use qqmusic_api::login::LoginPhase;
use qqmusic_api::types::{Quality, SearchPage, Singer, Song};
use qqmusic_api::{BridgeConfig, QqMusicClient, cover_url};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "qqmusic", version, about = "QQ Music command-line client")]
struct Cli {
    /// Login cookie attached to requests (`uin=...; skey=...`)
    #[arg(long, global = true, env = "QQMUSIC_COOKIE", hide_env_values = true)]
    cookie: Option<String>,
    /// Print raw JSON instead of a summary
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Log in by scanning a QR code with the QQ Music app
    Login {
        /// Where to write the QR image
        #[arg(short, long, default_value = "qqmusic-login.png")]
        output: PathBuf,
        /// Seconds between status polls
        #[arg(short, long, default_value = "2")]
        interval: u64,
    },
    /// Show playlist details
    Playlist {
        /// Playlist ID (disstid)
        playlist_id: String,
        /// Include the track list
        #[arg(short, long)]
        detail: bool,
    },
    /// Resolve a playback URL
    Url {
        /// Song mid
        mid: String,
        /// Audio quality
        #[arg(short, long, default_value = "aac")]
        quality: QualityArg,
    },
    /// Get song lyrics
    Lyric {
        /// Song mid
        mid: String,
    },
    /// Search for songs, singers, albums, or MVs
    Search {
        /// Search keyword
        keyword: String,
        /// Search type
        #[arg(short = 't', long, default_value = "song")]
        r#type: SearchKind,
        /// Result page, starting at 1
        #[arg(short, long, default_value = "1")]
        page: u32,
    },
    /// Show album details
    Album {
        /// Album mid
        mid: String,
    },
    /// Show MV details
    Mv {
        /// MV vid
        vid: String,
    },
    /// Show the logged-in user's profile
    Me,
    /// Print the cover image URL for an album, singer, or user
    Cover {
        /// Album/singer mid or user uin
        id: String,
        /// Content type (`album`, `singer`, `user`)
        #[arg(short = 't', long, default_value = "album")]
        r#type: String,
    },
}

#[derive(Clone, ValueEnum)]
enum SearchKind {
    Song,
    Singer,
    Album,
    Mv,
}

#[derive(Clone, ValueEnum)]
enum QualityArg {
    Aac,
    Standard,
    High,
    Lossless,
}

impl From<QualityArg> for Quality {
    fn from(q: QualityArg) -> Self {
        match q {
            QualityArg::Aac => Self::Aac,
            QualityArg::Standard => Self::Standard,
            QualityArg::High => Self::High,
            QualityArg::Lossless => Self::Lossless,
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = BridgeConfig::from_env().context("invalid QQMUSIC_BRIDGE_* setting")?;
    let client = QqMusicClient::with_config(config)?;
    let cookie = cli.cookie.as_deref();

    match cli.command {
        Command::Login { output, interval } => cmd_login(&client, &output, interval, cli.json),
        Command::Playlist {
            playlist_id,
            detail,
        } => cmd_playlist(&client, &playlist_id, detail, cookie, cli.json),
        Command::Url { mid, quality } => {
            let url = client.song_url(&mid, quality.into(), cookie)?;
            if cli.json {
                return print_json(&url);
            }
            println!("{}", url.url);
            Ok(())
        }
        Command::Lyric { mid } => cmd_lyric(&client, &mid, cookie, cli.json),
        Command::Search {
            keyword,
            r#type,
            page,
        } => cmd_search(&client, &keyword, r#type, page, cli.json),
        Command::Album { mid } => {
            let album = client.album_info(&mid)?;
            if cli.json {
                return print_json(&album);
            }
            println!("Album:  {} (mid={})", album.name, album.mid);
            println!("Singer: {}", singer_names(&album.singers));
            if let Some(date) = &album.publish_date {
                println!("Date:   {date}");
            }
            if let Some(url) = &album.cover_url {
                println!("Cover:  {url}");
            }
            Ok(())
        }
        Command::Mv { vid } => {
            let mv = client.mv_info(&vid)?;
            if cli.json {
                return print_json(&mv);
            }
            println!("MV:       {} (vid={})", mv.name, mv.vid);
            println!("Singer:   {}", singer_names(&mv.singers));
            println!("Duration: {}", duration(mv.duration_secs));
            Ok(())
        }
        Command::Me => {
            let profile = client.user_info(cookie)?;
            if cli.json {
                return print_json(&profile);
            }
            println!("User:   {} (uin={})", profile.nickname, profile.uin);
            if let Some(url) = &profile.avatar_url {
                println!("Avatar: {url}");
            }
            Ok(())
        }
        Command::Cover { id, r#type } => {
            println!("{}", cover_url(&id, &r#type)?);
            Ok(())
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn singer_names(singers: &[Singer]) -> String {
    singers
        .iter()
        .map(|s| s.name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

fn duration(secs: u64) -> String {
    format!("{}:{:02}", secs / 60, secs % 60)
}

// ── login ──

fn cmd_login(client: &QqMusicClient, output: &Path, interval: u64, json: bool) -> Result<()> {
    let started = client.start_login();
    if let Some(err) = started.error() {
        bail!("failed to start login: {err}");
    }
    let payload = started
        .qr_payload
        .as_ref()
        .context("login started without a QR code")?;
    let image = STANDARD
        .decode(&payload.base64)
        .context("QR payload is not valid base64")?;
    std::fs::write(output, image)
        .with_context(|| format!("failed to write {}", output.display()))?;
    println!("Scan {} with the QQ Music app.", output.display());

    let mut last = started.phase.name();
    loop {
        thread::sleep(Duration::from_secs(interval.max(1)));
        let state = client.poll_login(&started.key)?;
        if state.phase.name() != last {
            last = state.phase.name();
            eprintln!("status: {last}");
        }
        match &state.phase {
            LoginPhase::Confirmed(session) => {
                if json {
                    return print_json(&state);
                }
                println!("Logged in as {}", session.uin().unwrap_or("?"));
                println!("Cookie: {}", session.cookie());
                println!("Export it as QQMUSIC_COOKIE to reuse this session.");
                return Ok(());
            }
            LoginPhase::Expired => bail!("QR code expired, run login again"),
            LoginPhase::Failed(err) => bail!("login failed: {err}"),
            LoginPhase::Created | LoginPhase::WaitingScan | LoginPhase::Scanned => {}
        }
    }
}

// ── playlist / lyric ──

fn cmd_playlist(
    client: &QqMusicClient,
    id: &str,
    detail: bool,
    cookie: Option<&str>,
    json: bool,
) -> Result<()> {
    let p = if detail {
        client.playlist_detail(id, cookie)?
    } else {
        client.playlist(id, cookie)?
    };
    if json {
        return print_json(&p);
    }
    println!("Playlist: {} (id={})", p.title, p.id);
    println!("Tracks:   {}", p.track_count);
    if let Some(desc) = &p.description {
        println!("Desc:     {desc}");
    }
    if let Some(owner) = &p.owner {
        println!("Owner:    {}", owner.name);
    }
    if let Some(tracks) = &p.tracks {
        println!();
        for t in tracks {
            print_song(t);
        }
        if p.skipped_tracks > 0 {
            println!("  ({} unreadable tracks skipped)", p.skipped_tracks);
        }
    }
    Ok(())
}

fn cmd_lyric(client: &QqMusicClient, mid: &str, cookie: Option<&str>, json: bool) -> Result<()> {
    let lyric = client.lyric(mid, cookie)?;
    if json {
        return print_json(&lyric);
    }
    println!("{}", lyric.text);
    if let Some(trans) = &lyric.translation {
        println!("\n--- Translation ---\n{trans}");
    }
    Ok(())
}

// ── search ──

fn print_song(t: &Song) {
    println!(
        "  [{}] {} - {} ({})",
        t.mid,
        singer_names(&t.singers),
        t.name,
        duration(t.duration_secs),
    );
}

fn print_total<T>(page: &SearchPage<T>) {
    println!("Total: {} (page {})\n", page.total, page.page);
}

fn cmd_search(
    client: &QqMusicClient,
    keyword: &str,
    kind: SearchKind,
    page: u32,
    json: bool,
) -> Result<()> {
    match kind {
        SearchKind::Song => {
            let result = client.search_songs(keyword, page)?;
            if json {
                return print_json(&result);
            }
            print_total(&result);
            result.items.iter().for_each(print_song);
        }
        SearchKind::Singer => {
            let result = client.search_singers(keyword, page)?;
            if json {
                return print_json(&result);
            }
            print_total(&result);
            for s in &result.items {
                println!("  [{}] {}", s.mid, s.name);
            }
        }
        SearchKind::Album => {
            let result = client.search_albums(keyword, page)?;
            if json {
                return print_json(&result);
            }
            print_total(&result);
            for a in &result.items {
                println!("  [{}] {} - {}", a.mid, singer_names(&a.singers), a.name);
            }
        }
        SearchKind::Mv => {
            let result = client.search_mvs(keyword, page)?;
            if json {
                return print_json(&result);
            }
            print_total(&result);
            for m in &result.items {
                println!("  [{}] {} - {}", m.vid, singer_names(&m.singers), m.name);
            }
        }
    }
    Ok(())
}
