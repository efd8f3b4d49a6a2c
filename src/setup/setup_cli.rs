use clap::{Parser, Subcommand, ValueEnum};
use postflow_backend::config::Config;
use postflow_backend::models::db_operations::users_db_operations;
use postflow_backend::setup::db_setup;
use postflow_backend::workflow::{Role, RoleSet};
use redb::Database;
use rusqlite::Connection;
use std::fs;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "setup_cli",
    author,
    version,
    about = "Database setup and user administration for PostFlow.",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the .env configuration file.
    #[arg(long, required = true, value_name = "FILE")]
    env_file: PathBuf,
}

#[derive(Subcommand, Debug)]
enum Commands {
    Db {
        #[command(subcommand)]
        action: DbAction,
    },
    User {
        #[command(subcommand)]
        action: UserAction,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum DbKind {
    Users,
    Posts,
}

#[derive(Subcommand, Debug)]
enum DbAction {
    /// Creates the databases. Without an argument both are created.
    Setup {
        db_type: Option<DbKind>,
    },
}

#[derive(Subcommand, Debug)]
enum UserAction {
    Create {
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
        /// Repeat for several roles, e.g. `--role author --role moderator`.
        #[arg(long = "role")]
        roles: Vec<Role>,
    },
    List,
    SetRoles {
        #[arg(long)]
        username: String,
        #[arg(long = "role")]
        roles: Vec<Role>,
    },
    ChangePassword {
        #[arg(long)]
        username: String,
        #[arg(long)]
        new_password: String,
    },
    /// Suspends or reactivates an account.
    SetActive {
        #[arg(long)]
        username: String,
        #[arg(long, action = clap::ArgAction::Set)]
        active: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    let config = Config::from_env(&cli.env_file)
        .expect("FATAL: Failed to load or parse configuration.");
    env_logger::init_from_env(env_logger::Env::new().default_filter_or(&config.log_level));

    match cli.command {
        Commands::Db { action: DbAction::Setup { db_type } } => match db_type {
            Some(DbKind::Users) => setup_users_database(&config),
            Some(DbKind::Posts) => setup_posts_database(&config),
            None => {
                setup_users_database(&config);
                setup_posts_database(&config);
            }
        },
        Commands::User { action } => {
            let Some(conn) = open_users_db(&config) else {
                return;
            };
            match action {
                UserAction::Create { username, password, roles } => {
                    create_user(&conn, &username, &password, roles)
                }
                UserAction::List => list_users(&conn),
                UserAction::SetRoles { username, roles } => set_roles(&conn, &username, roles),
                UserAction::ChangePassword { username, new_password } => {
                    change_password(&conn, &username, &new_password)
                }
                UserAction::SetActive { username, active } => set_active(&conn, &username, active),
            }
        }
    }
}

fn setup_users_database(config: &Config) {
    let db_path = config.users_db_path();
    println!("\nSetting up users database at '{}'...", db_path.display());

    if let Some(parent_dir) = db_path.parent() {
        if let Err(e) = fs::create_dir_all(parent_dir) {
            eprintln!("❌ Error: Could not create database directory: {}", e);
            return;
        }
    }

    let mut conn = match Connection::open(&db_path) {
        Ok(conn) => conn,
        Err(e) => {
            eprintln!("❌ Error: Could not open users database file: {}", e);
            return;
        }
    };
    match db_setup::setup_users_db(&mut conn) {
        Ok(_) => println!("✅ Users database setup completed successfully."),
        Err(e) => eprintln!("❌ Error setting up users database: {}", e),
    }
}

fn setup_posts_database(config: &Config) {
    let db_path = config.posts_db_path();
    println!("\nSetting up posts database at '{}'...", db_path.display());

    if let Some(parent_dir) = db_path.parent() {
        if let Err(e) = fs::create_dir_all(parent_dir) {
            eprintln!("❌ Error: Could not create database directory: {}", e);
            return;
        }
    }

    // `create` opens an existing file as-is; table setup is idempotent.
    let db = match Database::create(&db_path) {
        Ok(db) => db,
        Err(e) => {
            eprintln!("❌ Error: Could not open posts database file: {}", e);
            return;
        }
    };
    match db_setup::setup_posts_db(&db) {
        Ok(_) => println!("✅ Posts database setup completed successfully."),
        Err(e) => eprintln!("❌ Error setting up posts database: {}", e),
    }
}

fn open_users_db(config: &Config) -> Option<Connection> {
    let db_path = config.users_db_path();
    if !db_path.exists() {
        eprintln!(
            "❌ Error: Users database not found at '{}'. Please run `setup_cli db setup` first.",
            db_path.display()
        );
        return None;
    }
    match Connection::open(&db_path) {
        Ok(conn) => Some(conn),
        Err(e) => {
            eprintln!("❌ Error opening users database: {}", e);
            None
        }
    }
}

fn create_user(conn: &Connection, username: &str, password: &str, roles: Vec<Role>) {
    let roles: RoleSet = roles.into_iter().collect();
    match users_db_operations::create_user(conn, username, password, &roles) {
        Ok(id) => println!(
            "✅ User '{}' (id {}) created with roles [{}], level {}.",
            username,
            id,
            roles.names().join(", "),
            roles.level()
        ),
        Err(e) => eprintln!("❌ Error creating user: {}. The username may already exist.", e),
    }
}

fn list_users(conn: &Connection) {
    match users_db_operations::read_all_users(conn) {
        Ok(users) => {
            println!("Listing users:");
            for user in users {
                println!(
                    "- {} (id {}, level {}{}) roles: [{}] last login: {}",
                    user.username,
                    user.id,
                    user.roles.level(),
                    if user.is_active { "" } else { ", suspended" },
                    user.roles.names().join(", "),
                    user.last_login_time.as_deref().unwrap_or("never"),
                );
            }
        }
        Err(e) => eprintln!("❌ Error fetching users: {}", e),
    }
}

fn set_roles(conn: &Connection, username: &str, roles: Vec<Role>) {
    let roles: RoleSet = roles.into_iter().collect();
    match users_db_operations::set_user_roles(conn, username, &roles) {
        Ok(0) => eprintln!("❌ Error: No user named '{}' found.", username),
        Ok(_) => println!("✅ Roles of '{}' set to [{}].", username, roles.names().join(", ")),
        Err(e) => eprintln!("❌ Error updating roles: {}", e),
    }
}

fn change_password(conn: &Connection, username: &str, new_password: &str) {
    match users_db_operations::change_password(conn, username, new_password) {
        Ok(0) => eprintln!("❌ Error: No user named '{}' found.", username),
        Ok(_) => println!("✅ Password for '{}' changed successfully.", username),
        Err(e) => eprintln!("❌ Error updating password: {}", e),
    }
}

fn set_active(conn: &Connection, username: &str, active: bool) {
    match users_db_operations::set_user_active(conn, username, active) {
        Ok(0) => eprintln!("❌ Error: No user named '{}' found.", username),
        Ok(_) if active => println!("✅ User '{}' reactivated.", username),
        Ok(_) => println!("✅ User '{}' suspended.", username),
        Err(e) => eprintln!("❌ Error updating account status: {}", e),
    }
}
