use clap::{
    CommandFactory, Parser, Subcommand,
    builder::{
        Styles,
        styling::{AnsiColor, Effects},
    },
};
use clap_complete::{Shell, generate};
use tracing_subscriber::EnvFilter;

use spotiplay::{
    cli,
    config::{self, Config},
    error,
    spotify::SpotifyClient,
    types::UpdatePlaylistRequest,
};

fn styles() -> Styles {
    Styles::styled()
        .header(AnsiColor::White.on_default() | Effects::BOLD)
        .usage(AnsiColor::White.on_default() | Effects::BOLD)
        .literal(AnsiColor::BrightBlue.on_default())
        .placeholder(AnsiColor::BrightGreen.on_default())
}

#[derive(Parser, Debug, Clone)]
#[clap(
  version = env!("CARGO_PKG_VERSION"),
  name=env!("CARGO_PKG_NAME"),
  bin_name=env!("CARGO_PKG_NAME"),
  author=env!("CARGO_PKG_AUTHORS"),
  about=env!("CARGO_PKG_DESCRIPTION"),
  styles=styles(),
)]
struct Cli {
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Authorize with Spotify API
    Auth(AuthOptions),

    /// Remove cached tokens
    Logout,

    /// Show the authenticated user's profile
    Me,

    /// List playlists
    Playlists(PlaylistsOptions),

    /// Handle a single playlist
    Playlist(PlaylistOptions),

    /// Show a track
    Track(TrackOptions),

    /// Search for tracks
    Search(SearchOptions),

    /// Get shell completions
    Completions(CompletionsOption),
}

#[derive(Parser, Debug, Clone)]
pub struct AuthOptions {
    /// Authorize again even if a token is cached
    #[clap(long)]
    pub force: bool,
}

#[derive(Parser, Debug, Clone)]
pub struct PlaylistsOptions {
    /// List playlists of another user
    #[clap(long)]
    pub user: Option<String>,

    #[clap(long, default_value_t = 20)]
    pub limit: u32,

    #[clap(long, default_value_t = 0)]
    pub offset: u32,
}

#[derive(Parser, Debug, Clone)]
pub struct PlaylistOptions {
    #[command(subcommand)]
    pub command: PlaylistSubcommand,
}

#[derive(Subcommand, Debug, Clone)]
pub enum PlaylistSubcommand {
    /// Show a playlist and its tracks
    Show {
        id: String,
        #[clap(long)]
        market: Option<String>,
    },

    /// Create a new playlist
    Create {
        name: String,
        #[clap(long)]
        description: Option<String>,
        /// Create the playlist as private
        #[clap(long)]
        private: bool,
        #[clap(long)]
        collaborative: bool,
    },

    /// Add tracks by URI
    Add {
        id: String,
        #[clap(required = true)]
        uris: Vec<String>,
        /// Zero-based insert position
        #[clap(long)]
        position: Option<u32>,
    },

    /// Remove tracks by URI
    Remove {
        id: String,
        #[clap(required = true)]
        uris: Vec<String>,
    },

    /// Change playlist details
    Update {
        id: String,
        #[clap(long)]
        name: Option<String>,
        #[clap(long)]
        description: Option<String>,
        #[clap(long, conflicts_with = "private")]
        public: bool,
        #[clap(long)]
        private: bool,
        #[clap(long)]
        collaborative: Option<bool>,
    },
}

#[derive(Parser, Debug, Clone)]
pub struct TrackOptions {
    id: String,
}

#[derive(Parser, Debug, Clone)]
pub struct SearchOptions {
    query: String,
    #[clap(long)]
    market: Option<String>,
    #[clap(long, default_value_t = 20)]
    limit: u32,
}

#[derive(Parser, Debug, Clone)]
pub struct CompletionsOption {
    shell: Shell,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

#[tokio::main]
async fn main() {
    init_tracing();

    if let Err(e) = config::load_env().await {
        error!("Cannot load environment. Err: {}", e);
    }

    let cli = Cli::parse();

    if let Command::Completions(opt) = &cli.command {
        let mut cmd = Cli::command();
        let name = cmd.get_name().to_string();
        generate(opt.shell, &mut cmd, name, &mut std::io::stdout());
        return;
    }

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => error!("{}", e),
    };
    let client = match SpotifyClient::new(config) {
        Ok(client) => client,
        Err(e) => error!("{}\nSet SPOTIFY_CLIENT_ID and SPOTIFY_CLIENT_SECRET.", e),
    };

    match cli.command {
        Command::Auth(opt) => cli::auth(&client, opt.force).await,
        Command::Logout => cli::logout(&client).await,
        Command::Me => cli::me(&client).await,
        Command::Playlists(opt) => {
            cli::list_playlists(&client, opt.user, opt.limit, opt.offset).await
        }
        Command::Playlist(opt) => match opt.command {
            PlaylistSubcommand::Show { id, market } => {
                cli::show_playlist(&client, &id, market).await
            }
            PlaylistSubcommand::Create {
                name,
                description,
                private,
                collaborative,
            } => cli::create_playlist(&client, &name, description, !private, collaborative).await,
            PlaylistSubcommand::Add { id, uris, position } => {
                cli::add_tracks(&client, &id, uris, position).await
            }
            PlaylistSubcommand::Remove { id, uris } => cli::remove_tracks(&client, &id, uris).await,
            PlaylistSubcommand::Update {
                id,
                name,
                description,
                public,
                private,
                collaborative,
            } => {
                let changes = UpdatePlaylistRequest {
                    name,
                    description,
                    public: (public || private).then_some(public),
                    collaborative,
                };
                cli::update_playlist(&client, &id, changes).await
            }
        },
        Command::Track(opt) => cli::track(&client, &opt.id).await,
        Command::Search(opt) => cli::search(&client, &opt.query, opt.market, opt.limit).await,
        Command::Completions(_) => {}
    }

    client.close().await;
}
