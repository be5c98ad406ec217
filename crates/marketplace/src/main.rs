//! Marketplace admin tool.
//!
//! Inspects and edits a marketplace database from the command line.

mod output;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use marketplace::{
    Args, CreateClient, CreateSeller, CreateUser, Id, MarketplaceClient, Role, UserWithProfile,
};
use output::OutputFormat;

/// Marketplace admin tool
#[derive(Parser, Debug)]
#[command(name = "marketplace")]
#[command(version, about = "Marketplace data layer admin tool", long_about = None)]
struct Cli {
    #[command(flatten)]
    storage: Args,

    /// Output format
    #[arg(long, default_value = "table", value_enum, global = true)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Manage users
    Users {
        #[command(subcommand)]
        action: UsersCommand,
    },
    /// Inspect products
    Products {
        #[command(subcommand)]
        action: ProductsCommand,
    },
    /// Show record counts
    Stats,
}

#[derive(Subcommand, Debug)]
enum UsersCommand {
    /// List all users
    List,
    /// Show one user by id, email or username
    Show { key: String },
    /// Create a user with its profile
    Create {
        #[arg(long)]
        email: String,
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
        /// CLIENT or SELLER
        #[arg(long)]
        role: String,
        #[arg(long)]
        firstname: Option<String>,
        #[arg(long)]
        lastname: Option<String>,
        #[arg(long)]
        business_name: Option<String>,
    },
    /// Delete a user and everything it owns
    Delete { id: Id },
}

#[derive(Subcommand, Debug)]
enum ProductsCommand {
    /// List products
    List {
        /// Only products of this seller
        #[arg(long)]
        seller: Option<Id>,
    },
}

fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "marketplace=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = cli.storage.into_config();
    let client = MarketplaceClient::open(config)?;
    let format = cli.format;

    let rendered = match cli.command {
        Command::Users { action } => match action {
            UsersCommand::List => output::users(format, &client.users().list()?),
            UsersCommand::Show { key } => {
                let user = find_user(&client, &key)?
                    .ok_or_else(|| format!("no user matches '{key}'"))?;
                output::user(format, &user)
            }
            UsersCommand::Create {
                email,
                username,
                password,
                role,
                firstname,
                lastname,
                business_name,
            } => {
                let role: Role = role.parse()?;
                let mut input = CreateUser::new(email, username, password).with_role(role);
                match role {
                    Role::Client => {
                        let (Some(first), Some(last)) = (firstname, lastname) else {
                            return Err("a CLIENT user needs --firstname and --lastname".into());
                        };
                        input = input.with_client(CreateClient::new(first, last));
                    }
                    Role::Seller => {
                        let Some(name) = business_name else {
                            return Err("a SELLER user needs --business-name".into());
                        };
                        input = input.with_seller(CreateSeller::new(name));
                    }
                }
                output::user(format, &client.users().create(input)?)
            }
            UsersCommand::Delete { id } => output::deleted(format, &client.users().delete(id)?),
        },
        Command::Products {
            action: ProductsCommand::List { seller },
        } => {
            let products = match seller {
                Some(seller_id) => client.products().list_by_seller(seller_id)?,
                None => client.products().list()?,
            };
            output::products(format, &products)
        }
        Command::Stats => output::stats(format, &client.stats()?),
    };

    println!("{}", rendered);
    client.flush()?;
    Ok(())
}

/// Resolve a user by id, then email, then username.
fn find_user(
    client: &MarketplaceClient,
    key: &str,
) -> Result<Option<UserWithProfile>, marketplace::Error> {
    let users = client.users();
    if let Ok(id) = key.parse::<Id>() {
        if let Some(user) = users.find_with_profile(id)? {
            return Ok(Some(user));
        }
    }
    let user = if key.contains('@') {
        users.find_by_email(key)?
    } else {
        users.find_by_username(key)?
    };
    match user {
        Some(user) => users.find_with_profile(user.id),
        None => Ok(None),
    }
}
