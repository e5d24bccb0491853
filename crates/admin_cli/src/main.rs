use std::error::Error;

use clap::{Args, Parser, Subcommand};
use engine::{CreateCompanyCmd, CreateUserCmd, Currency, Engine, Role};
use migration::MigratorTrait;
use sea_orm::{Database, DatabaseConnection};
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(name = "rimborso_admin")]
#[command(about = "Admin utilities for Rimborso (bootstrap companies/users)")]
struct Cli {
    /// Database connection string (also read from `DATABASE_URL`).
    #[arg(
        long,
        env = "DATABASE_URL",
        default_value = "sqlite:./rimborso.db?mode=rwc"
    )]
    database_url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Company(Company),
    User(User),
}

#[derive(Args, Debug)]
struct Company {
    #[command(subcommand)]
    command: CompanyCommand,
}

#[derive(Subcommand, Debug)]
enum CompanyCommand {
    Create(CompanyCreateArgs),
}

#[derive(Args, Debug)]
struct CompanyCreateArgs {
    #[arg(long)]
    name: String,
    #[arg(long)]
    country: String,
    #[arg(long, default_value = "EUR")]
    currency: String,
}

#[derive(Args, Debug)]
struct User {
    #[command(subcommand)]
    command: UserCommand,
}

#[derive(Subcommand, Debug)]
enum UserCommand {
    Create(UserCreateArgs),
}

#[derive(Args, Debug)]
struct UserCreateArgs {
    #[arg(long)]
    company_id: Uuid,
    #[arg(long)]
    name: String,
    #[arg(long)]
    email: String,
    /// Also read from `RIMBORSO_PASSWORD` so it stays out of shell history.
    #[arg(long, env = "RIMBORSO_PASSWORD")]
    password: String,
    #[arg(long, default_value = "admin")]
    role: String,
    #[arg(long)]
    manager_id: Option<Uuid>,
}

fn parse_currency(raw: &str) -> Result<Currency, String> {
    Currency::try_from(raw).map_err(|err| err.to_string())
}

fn parse_role(raw: &str) -> Result<Role, String> {
    Role::try_from(raw).map_err(|err| err.to_string())
}

async fn connect(database_url: &str) -> Result<DatabaseConnection, Box<dyn Error + Send + Sync>> {
    let db = Database::connect(database_url).await?;
    migration::Migrator::up(&db, None).await?;
    Ok(db)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    let cli = Cli::parse();
    let db = connect(&cli.database_url).await?;
    let engine = Engine::builder().database(db).build().await?;

    match cli.command {
        Command::Company(company) => match company.command {
            CompanyCommand::Create(args) => {
                let currency = parse_currency(&args.currency)?;
                let company = engine
                    .create_company(CreateCompanyCmd::new(args.name, args.country, currency))
                    .await?;
                println!("created company {} ({})", company.name, company.id);
            }
        },
        Command::User(user) => match user.command {
            UserCommand::Create(args) => {
                let role = parse_role(&args.role)?;
                let mut cmd = CreateUserCmd::new(
                    args.company_id,
                    args.name,
                    args.email,
                    args.password,
                    role,
                );
                if let Some(manager_id) = args.manager_id {
                    cmd = cmd.manager(manager_id);
                }
                let user = engine.create_user(cmd).await?;
                println!("created user {} ({})", user.email, user.id);
            }
        },
    }

    Ok(())
}
