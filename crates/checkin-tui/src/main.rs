//! `checkin` — terminal client for the Daily Check-In blog.
//!
//! # Usage
//!
//! ```
//! checkin --url https://abc.example.co --api-key <anon-key>
//! checkin --config ~/.config/checkin/config.toml
//! checkin post --category eat --content "late night ramen" --image photo.jpg
//! checkin delete 4f1c…
//! checkin now-playing https://open.spotify.com/track/…
//! ```
//!
//! Without a subcommand the feed browser opens. Owner subcommands need
//! the owner's credentials (flags, env, or config file).

mod app;
mod ui;

use std::{io, path::PathBuf, time::Duration};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use crossterm::{
  event::{self, Event},
  execute,
  terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode,
    enable_raw_mode,
  },
};
use ratatui::{Terminal, backend::CrosstermBackend};
use serde::Deserialize;
use uuid::Uuid;

use app::App;
use checkin_core::post::{Category, NewPost, parse_hashtags};
use checkin_feed::{
  authoring::{AuthoringWorkflow, PostDraft},
  feed::single_post,
  identity::IdentityResolver,
};
use checkin_store_rest::{
  RealtimeConfig, RealtimeFeed, RestAuth, RestClient, RestConfig, RestStore,
  media::{self, MediaKind},
  music::{self, MusicLookup},
  weather::WeatherService,
};

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "checkin", about = "Terminal client for the Daily Check-In blog")]
struct Args {
  /// Path to a TOML config file (url, api_key, email, password).
  #[arg(short, long, value_name = "FILE")]
  config: Option<PathBuf>,

  /// Base URL of the hosted backend.
  #[arg(long, env = "CHECKIN_URL")]
  url: Option<String>,

  /// Public (anon) API key for the hosted backend.
  #[arg(long, env = "CHECKIN_API_KEY")]
  api_key: Option<String>,

  /// Sign in with this email (required for owner subcommands).
  #[arg(long, env = "CHECKIN_EMAIL")]
  email: Option<String>,

  /// Password for `--email`.
  #[arg(long, env = "CHECKIN_PASSWORD")]
  password: Option<String>,

  #[command(subcommand)]
  command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Register an account with the hosted auth service.
  SignUp {
    email:    String,
    password: String,
  },

  /// Create a post (owner only).
  Post {
    #[arg(long)]
    category: Category,
    /// Optional; empty titles resolve to the category default.
    #[arg(long, default_value = "")]
    title:    String,
    #[arg(long)]
    content:  String,
    /// Space-separated tags, leading `#` optional.
    #[arg(long, default_value = "")]
    hashtags: String,
    /// Image files to upload and attach (repeatable).
    #[arg(long)]
    image:    Vec<PathBuf>,
    /// Video files to upload and attach (repeatable).
    #[arg(long)]
    video:    Vec<PathBuf>,
    /// Attach current weather (uses `weather_api_key` from config).
    #[arg(long)]
    weather:  bool,
    #[arg(long, requires = "weather")]
    lat:      Option<f64>,
    #[arg(long, requires = "weather")]
    lon:      Option<f64>,
    /// Attach a music link (track/playlist/album page URL).
    #[arg(long)]
    music:    Option<String>,
    /// Save as a draft, hidden from visitors.
    #[arg(long)]
    draft:    bool,
  },

  /// Edit a post's text fields (owner only).
  Edit {
    id:       Uuid,
    #[arg(long)]
    title:    Option<String>,
    #[arg(long)]
    content:  Option<String>,
    #[arg(long)]
    hashtags: Option<String>,
  },

  /// Delete a post and everything attached to it (owner only).
  Delete {
    id:  Uuid,
    /// Skip the confirmation prompt.
    #[arg(long)]
    yes: bool,
  },

  /// Update the "Now Playing" widget from a music link (owner only).
  NowPlaying { url: String },

  /// Update your own profile.
  Profile {
    #[arg(long)]
    username: Option<String>,
    /// Avatar image file to upload.
    #[arg(long)]
    avatar:   Option<PathBuf>,
  },
}

// ─── Config file ──────────────────────────────────────────────────────────────

/// Shape of the optional TOML config file.
#[derive(Deserialize, Default)]
struct ConfigFile {
  #[serde(default)]
  url:             String,
  #[serde(default)]
  api_key:         String,
  #[serde(default)]
  email:           String,
  #[serde(default)]
  password:        String,
  #[serde(default)]
  weather_api_key: String,
}

struct Services {
  store:           std::sync::Arc<RestStore>,
  auth:            std::sync::Arc<RestAuth>,
  realtime:        std::sync::Arc<RealtimeFeed>,
  resolver:        IdentityResolver<RestAuth, RestStore>,
  weather_api_key: String,
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
    .with_writer(io::stderr)
    .init();

  let args = Args::parse();

  let file_cfg: ConfigFile = if let Some(path) = &args.config {
    let raw = std::fs::read_to_string(path)
      .with_context(|| format!("reading config file {}", path.display()))?;
    toml::from_str(&raw).context("parsing config file")?
  } else {
    ConfigFile::default()
  };

  // CLI flags override config file.
  let url = args
    .url
    .or_else(|| (!file_cfg.url.is_empty()).then(|| file_cfg.url.clone()))
    .context("no backend URL; pass --url or set it in the config file")?;
  let api_key = args
    .api_key
    .or_else(|| (!file_cfg.api_key.is_empty()).then(|| file_cfg.api_key.clone()))
    .context("no API key; pass --api-key or set it in the config file")?;
  let email = args
    .email
    .or_else(|| (!file_cfg.email.is_empty()).then(|| file_cfg.email.clone()));
  let password = args
    .password
    .or_else(|| (!file_cfg.password.is_empty()).then(|| file_cfg.password.clone()));

  let client = RestClient::new(RestConfig::new(url.clone(), api_key.clone()))?;
  let store = std::sync::Arc::new(RestStore::new(client.clone()));
  let auth = std::sync::Arc::new(RestAuth::new(client));
  let realtime = std::sync::Arc::new(RealtimeFeed::new(
    RealtimeConfig::from_base_url(&url, api_key),
  ));
  let resolver = IdentityResolver::new(
    auth.clone(),
    store.clone(),
    IdentityResolver::<RestAuth, RestStore>::default_session_file(),
  );

  if let (Some(email), Some(password)) = (&email, &password) {
    auth.sign_in(email, password).await.context("signing in")?;
  }

  let services = Services {
    store,
    auth,
    realtime,
    resolver,
    weather_api_key: file_cfg.weather_api_key,
  };

  match args.command {
    Some(command) => run_command(command, services).await,
    None => run_tui(services).await,
  }
}

// ─── Owner subcommands ────────────────────────────────────────────────────────

async fn run_command(command: Command, services: Services) -> Result<()> {
  let workflow =
    AuthoringWorkflow::new(services.resolver.clone(), services.store.clone());

  match command {
    Command::SignUp { email, password } => {
      services.auth.sign_up(&email, &password).await?;
      println!("signed up; check your email for a confirmation link");
    }

    Command::Post {
      category,
      title,
      content,
      hashtags,
      image,
      video,
      weather,
      lat,
      lon,
      music: music_url,
      draft,
    } => {
      let mut input = NewPost::new(category, content);
      input.title = title;
      input.hashtags = parse_hashtags(&hashtags);
      input.is_draft = draft;

      if weather {
        input.weather = Some(match (lat, lon) {
          (Some(lat), Some(lon)) => {
            WeatherService::new(services.weather_api_key.clone())?
              .current(lat, lon)
              .await
          }
          _ => WeatherService::fallback(),
        });
      }
      if let Some(url) = music_url {
        let entry = MusicLookup::new()?.resolve(&url).await?;
        input.music = Some(music::snapshot_for(&entry));
      }

      let mut attachments = PostDraft::default();
      for path in image {
        attachments.images.push(read_upload(MediaKind::Image, &path)?);
      }
      for path in video {
        attachments.videos.push(read_upload(MediaKind::Video, &path)?);
      }

      let post = workflow.create_post(input, attachments).await?;
      println!("created {} \"{}\" [{}]", post.id, post.title, post.category);
    }

    Command::Edit { id, title, content, hashtags } => {
      let existing = single_post(services.store.as_ref(), id).await?;
      let mut input = NewPost {
        category:   existing.category,
        title:      title.unwrap_or(existing.title),
        content:    content.unwrap_or(existing.content),
        hashtags:   hashtags
          .as_deref()
          .map(parse_hashtags)
          .unwrap_or(existing.hashtags),
        image_urls: existing.image_urls,
        video_urls: existing.video_urls,
        weather:    existing.weather,
        music:      existing.music,
        is_draft:   existing.is_draft,
      };
      input.title = input.resolved_title();
      let post = workflow.update_post(id, input, PostDraft::default()).await?;
      println!("updated {} \"{}\"", post.id, post.title);
    }

    Command::Delete { id, yes } => {
      let post = single_post(services.store.as_ref(), id).await?;
      if !yes && !confirm(&format!("Delete \"{}\"? [y/N] ", post.title))? {
        println!("aborted");
        return Ok(());
      }
      workflow.delete_post(id).await?;
      println!("deleted {id}");
    }

    Command::NowPlaying { url } => {
      let entry = MusicLookup::new()?.resolve(&url).await?;
      let saved = workflow.set_now_playing(entry).await?;
      match &saved.artist {
        Some(artist) => println!("now playing: {} · {}", saved.title, artist),
        None => println!("now playing: {}", saved.title),
      }
    }

    Command::Profile { username, avatar } => {
      let upload = match avatar {
        Some(path) => {
          let bytes = std::fs::read(&path)
            .with_context(|| format!("reading {}", path.display()))?;
          Some(media::avatar_upload(&file_name(&path), bytes))
        }
        None => None,
      };
      let patch = checkin_core::identity::ProfilePatch {
        username,
        avatar_url: None,
      };
      let profile = workflow.update_own_profile(patch, upload).await?;
      println!(
        "profile updated: {}",
        profile.username.as_deref().unwrap_or("(no username)")
      );
    }
  }

  Ok(())
}

fn read_upload(
  kind: MediaKind,
  path: &PathBuf,
) -> Result<checkin_core::store::MediaUpload> {
  let bytes = std::fs::read(path)
    .with_context(|| format!("reading {}", path.display()))?;
  Ok(media::post_upload(kind, &file_name(path), bytes))
}

fn file_name(path: &PathBuf) -> String {
  path
    .file_name()
    .map(|n| n.to_string_lossy().into_owned())
    .unwrap_or_else(|| "upload".to_string())
}

/// The explicit confirmation step in front of destructive actions.
fn confirm(prompt: &str) -> Result<bool> {
  use io::Write;
  print!("{prompt}");
  io::stdout().flush()?;
  let mut answer = String::new();
  io::stdin().read_line(&mut answer)?;
  Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
}

// ─── TUI ──────────────────────────────────────────────────────────────────────

async fn run_tui(services: Services) -> Result<()> {
  let mut app =
    App::new(services.store, services.realtime, services.resolver);

  enable_raw_mode().context("enabling raw mode")?;
  let mut stdout = io::stdout();
  execute!(stdout, EnterAlternateScreen).context("entering alternate screen")?;
  let backend = CrosstermBackend::new(stdout);
  let mut terminal = Terminal::new(backend).context("creating terminal")?;

  let load_result = app.mount().await;

  let run_result = if load_result.is_ok() {
    run_event_loop(&mut terminal, &mut app).await
  } else {
    load_result
  };

  // Restore terminal regardless of result.
  disable_raw_mode().ok();
  execute!(terminal.backend_mut(), LeaveAlternateScreen).ok();
  terminal.show_cursor().ok();

  run_result
}

async fn run_event_loop(
  terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
  app: &mut App,
) -> Result<()> {
  loop {
    // React to realtime/auth events before each frame.
    app.tick().await;

    terminal.draw(|f| ui::draw(f, app)).context("drawing frame")?;

    // Poll for an event, yielding control to tokio while waiting.
    let maybe_event = tokio::task::block_in_place(|| {
      if event::poll(Duration::from_millis(50))? {
        Ok::<_, io::Error>(Some(event::read()?))
      } else {
        Ok(None)
      }
    })?;

    if let Some(evt) = maybe_event {
      match evt {
        Event::Key(key) => {
          let cont = app.handle_key(key).await?;
          if !cont {
            break;
          }
        }
        Event::Resize(_, _) => {
          // Terminal will redraw on next iteration.
        }
        _ => {}
      }
    }
  }

  Ok(())
}
