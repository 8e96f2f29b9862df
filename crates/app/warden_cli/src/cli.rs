use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "warden", version, about = "Warden identity and access control")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the version
    Version,

    /// Hash a password with bcrypt and print the hash
    HashPassword {
        /// Plaintext password; read from stdin when omitted
        #[arg(long)]
        password: Option<String>,

        /// bcrypt cost factor
        #[arg(long, env = "BCRYPT_ROUNDS", default_value_t = 12)]
        cost: u32,
    },

    /// Print a random signing secret suitable for JWT_SECRET
    GenerateSecret,

    /// Load the auth configuration from the environment and report it
    CheckConfig,

    /// Run migrations, seed the system roles, and create the first administrator
    Bootstrap {
        /// PostgreSQL connection URL
        #[arg(
            long,
            env = "DATABASE_URL",
            default_value = "postgres://localhost:5432/warden"
        )]
        database_url: String,

        /// Administrator email; no account is created when omitted
        #[arg(long, env = "WARDEN_ADMIN_EMAIL")]
        admin_email: Option<String>,

        /// Administrator password
        #[arg(long, env = "WARDEN_ADMIN_PASSWORD", hide_env_values = true)]
        admin_password: Option<String>,

        #[arg(long, default_value = "System")]
        admin_first_name: String,

        #[arg(long, default_value = "Administrator")]
        admin_last_name: String,
    },
}
