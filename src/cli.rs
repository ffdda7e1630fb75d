use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "paddock_dashboard", version, about = "Farm paddock and device dashboard")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Sign in and store the session token.
    Login(LoginArgs),
    /// Forget the stored session.
    Logout,
    /// Create an account.
    Signup(SignupArgs),
    /// Ask for a password reset link by email.
    ForgotPassword(ForgotPasswordArgs),
    /// Set a new password with the token from the reset link.
    ResetPassword(ResetPasswordArgs),
    /// List your paddocks, or search paddocks and devices by name.
    Paddocks(PaddocksArgs),
    /// Show a paddock's devices and sensor averages.
    Paddock(PaddockArgs),
    PaddockCreate(PaddockCreateArgs),
    PaddockRename(PaddockRenameArgs),
    PaddockDelete(PaddockArgs),
    /// Show a device's readings, status and chart data.
    Device(DeviceArgs),
    DeviceRegister(DeviceRegisterArgs),
    DeviceUnlink(DeviceUnlinkArgs),
    /// Show or change account settings.
    Settings(SettingsArgs),
}

#[derive(Args)]
pub struct LoginArgs {
    #[arg(long)]
    pub email: String,
    /// Read from `FARM_PASSWORD` when omitted.
    #[arg(long, env = "FARM_PASSWORD", hide_env_values = true)]
    pub password: String,
}

#[derive(Args)]
pub struct SignupArgs {
    #[arg(long)]
    pub first_name: String,
    #[arg(long)]
    pub last_name: String,
    #[arg(long)]
    pub email: String,
    #[arg(long, env = "FARM_PASSWORD", hide_env_values = true)]
    pub password: String,
}

#[derive(Args)]
pub struct ForgotPasswordArgs {
    #[arg(long)]
    pub email: String,
}

#[derive(Args)]
pub struct ResetPasswordArgs {
    #[arg(long)]
    pub token: String,
    #[arg(long, env = "FARM_NEW_PASSWORD", hide_env_values = true)]
    pub new_password: String,
}

#[derive(Args)]
pub struct PaddocksArgs {
    /// Case-insensitive match on paddock and device names.
    #[arg(long)]
    pub search: Option<String>,
}

#[derive(Args)]
pub struct PaddockArgs {
    pub paddock_id: i64,
}

#[derive(Args)]
pub struct PaddockCreateArgs {
    #[arg(long)]
    pub name: Option<String>,
    /// One of: default, Grains, Legumes, Fruit, "Oil Seeds", "Root Crops", Tropical, Other.
    #[arg(long, default_value = "default")]
    pub crop: String,
    /// Hectares. Only the leading whole number is sent (`12.5` sends `12`);
    /// text without one is sent as no area.
    #[arg(long, default_value = "")]
    pub area: String,
    /// `YYYY-MM-DD`.
    #[arg(long, default_value = "")]
    pub plant_date: String,
    #[arg(long)]
    pub soil: Option<String>,
}

#[derive(Args)]
pub struct PaddockRenameArgs {
    pub paddock_id: i64,
    pub name: String,
    #[arg(long)]
    pub crop: Option<String>,
    #[arg(long)]
    pub area: Option<f64>,
}

#[derive(Args)]
pub struct DeviceArgs {
    pub node_id: String,
    /// Stream to chart and export instead of the first configured one.
    #[arg(long)]
    pub stream: Option<String>,
    /// Write the selected stream as CSV into this directory.
    #[arg(long)]
    pub export: Option<PathBuf>,
}

#[derive(Args)]
pub struct DeviceRegisterArgs {
    pub node_id: String,
    #[arg(long)]
    pub paddock: i64,
    #[arg(long)]
    pub name: Option<String>,
    #[arg(long)]
    pub secret_key: Option<String>,
}

#[derive(Args)]
pub struct DeviceUnlinkArgs {
    pub node_id: String,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum Toggle {
    On,
    Off,
}

#[derive(Args)]
pub struct SettingsArgs {
    #[arg(long, value_enum)]
    pub alerts: Option<Toggle>,
}
