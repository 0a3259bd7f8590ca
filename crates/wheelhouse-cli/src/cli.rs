use clap::{ArgAction, Parser, Subcommand, ValueHint};

#[derive(Parser)]
#[command(
    author,
    version,
    about,
    help_template = "{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}",
    arg_required_else_help = true
)]
pub struct Args {
    /// Set output verbosity
    #[arg(short = 'v', long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress outputs
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output as json
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Disable colors in output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Provide custom config file
    #[arg(short, long, global = true, value_hint = ValueHint::FilePath)]
    pub config: Option<String>,

    /// Set proxy for upstream index requests
    #[arg(required = false, long, short = 'P', global = true)]
    pub proxy: Option<String>,

    /// Set user agent for upstream index requests
    #[arg(required = false, long, short = 'A', global = true)]
    pub user_agent: Option<String>,

    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Serve the registry over HTTP
    Serve {
        /// Address to listen on, overriding the configured one
        #[arg(required = false, short, long)]
        listen: Option<String>,
    },

    /// Fetch packages from the upstream index and add them to the registry
    #[command(arg_required_else_help = true)]
    Add {
        /// Package names (optionally `name==version`), archive URLs or local archives
        #[arg(required = true)]
        labels: Vec<String>,

        /// Owner of newly created packages, as a username or email
        #[arg(required = false, short, long)]
        owner: Option<String>,
    },

    /// Manage registry users
    #[command(arg_required_else_help = true)]
    User {
        #[clap(subcommand)]
        action: UserAction,
    },

    /// List packages, or the releases and files of one package
    #[clap(name = "list", visible_alias = "ls")]
    List {
        /// Package to show
        #[arg(required = false)]
        package: Option<String>,
    },

    /// Hide a release from version listings
    #[command(arg_required_else_help = true)]
    Hide {
        package: String,
        version: String,
    },

    /// Make a hidden release visible again
    #[command(arg_required_else_help = true)]
    Unhide {
        package: String,
        version: String,
    },

    /// List known classifiers
    Classifiers,

    /// Generate default config
    #[clap(name = "defconfig")]
    DefConfig,

    /// View env
    Env,
}

#[derive(Subcommand)]
pub enum UserAction {
    /// Create a user
    #[command(arg_required_else_help = true)]
    Add {
        /// Username
        username: String,

        /// Email address, used to match package author emails
        #[arg(required = true, short, long)]
        email: String,

        /// Password for uploads; users without one can only own packages
        #[arg(required = false, short, long)]
        password: Option<String>,
    },

    /// Set the password of a user
    #[command(arg_required_else_help = true)]
    Passwd {
        username: String,

        #[arg(required = true, short, long)]
        password: String,
    },

    /// List users
    List,
}
