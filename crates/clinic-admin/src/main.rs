//! Clinic Admin CLI Tool
//!
//! Inspect the permission tables, replay an authorization decision and check
//! an appointment window against a fixture, using the same code paths as the
//! request layer.
//!
//! Usage:
//!   clinic-admin permissions [--role <ROLE>]
//!   clinic-admin authorize --operation <op> --path <path> [--role <ROLE>] [--superuser] [--anonymous]
//!   clinic-admin check-window --appointments <file> --practitioner <id> --start <time> --duration <min>

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use clinic_shared::{
    AccessGate, Actor, ActorId, ClinicConfig, Clock, FixedClock, InMemoryAuditLog, Operation, Role,
    StaffDirectory, StaffId, SystemClock,
};
use scheduling_coordinator::{AvailabilityChecker, InMemoryAppointmentStore};
use scheduling_integrity::{Appointment, WindowRequest};
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "clinic-admin")]
#[command(version = "0.1.0")]
#[command(about = "Inspect clinic permissions and appointment windows", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (defaults to $CLINIC_CONFIG, then built-in defaults)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Output format: json or compact
    #[arg(short, long, default_value = "json", global = true)]
    format: String,

    /// Output file (stdout if not specified)
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the effective permission tables
    Permissions {
        /// Only this role (e.g. NURSE, lab-tech)
        #[arg(short, long)]
        role: Option<Role>,
    },

    /// Evaluate one authorization decision
    Authorize {
        /// Operation id or label (e.g. create_appointment, "view exam list")
        #[arg(long)]
        operation: Operation,

        /// Request path
        #[arg(long)]
        path: String,

        /// Role of the requesting account; omit to simulate a missing role
        #[arg(short, long)]
        role: Option<Role>,

        /// Request as a superuser
        #[arg(long)]
        superuser: bool,

        /// Request without authentication
        #[arg(long, conflicts_with_all = ["role", "superuser"])]
        anonymous: bool,
    },

    /// Check a proposed window against a JSON array of appointments
    CheckWindow {
        /// Appointments fixture
        #[arg(short, long)]
        appointments: PathBuf,

        /// Practitioner staff id
        #[arg(short, long)]
        practitioner: u64,

        /// Proposed start (RFC 3339)
        #[arg(short, long)]
        start: DateTime<Utc>,

        /// Duration in minutes (configured default if omitted)
        #[arg(short, long)]
        duration: Option<u32>,

        /// Appointment being edited
        #[arg(long)]
        exclude: Option<u64>,

        /// Pretend the current time is this instant (RFC 3339)
        #[arg(long)]
        now: Option<DateTime<Utc>>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => ClinicConfig::from_path(path)?,
        None => ClinicConfig::load()?,
    };

    let result: serde_json::Value = match cli.command {
        Commands::Permissions { role } => permissions(&config, role)?,
        Commands::Authorize {
            operation,
            path,
            role,
            superuser,
            anonymous,
        } => authorize(&config, operation, &path, role, superuser, anonymous)?,
        Commands::CheckWindow {
            appointments,
            practitioner,
            start,
            duration,
            exclude,
            now,
        } => {
            let request = WindowRequest {
                practitioner_id: StaffId(practitioner),
                start,
                duration_minutes: duration.unwrap_or(config.scheduling.default_duration_minutes),
                exclude_id: exclude.map(Into::into),
            };
            check_window(&config, &appointments, &request, now)?
        }
    };

    // Output result
    let output_str = match cli.format.as_str() {
        "compact" => serde_json::to_string(&result)?,
        _ => serde_json::to_string_pretty(&result)?,
    };

    if let Some(output_path) = cli.output {
        fs::write(&output_path, &output_str)?;
        eprintln!("Output written to: {}", output_path.display());
    } else {
        println!("{}", output_str);
    }

    Ok(())
}

fn permissions(
    config: &ClinicConfig,
    only: Option<Role>,
) -> Result<serde_json::Value, Box<dyn std::error::Error>> {
    let gate = AccessGate::new(config.gate.clone(), Arc::new(StaffDirectory::new()));
    let table = gate.permissions();

    let roles: Vec<serde_json::Value> = Role::ALL
        .into_iter()
        .filter(|role| only.map_or(true, |wanted| wanted == *role))
        .map(|role| {
            let operations: Vec<&str> = if role.is_admin() {
                vec!["*"]
            } else {
                table.operations_for(role).map(|op| op.id()).collect()
            };
            json!({
                "role": role,
                "label": role.label(),
                "operations": operations,
                "path_prefixes": table.prefixes_for(role),
            })
        })
        .collect();

    Ok(json!({ "public_prefixes": config.gate.public_prefixes, "roles": roles }))
}

fn authorize(
    config: &ClinicConfig,
    operation: Operation,
    path: &str,
    role: Option<Role>,
    superuser: bool,
    anonymous: bool,
) -> Result<serde_json::Value, Box<dyn std::error::Error>> {
    let directory = StaffDirectory::new();
    if let Some(role) = role {
        directory.assign(ActorId(1), role);
    }

    let audit = Arc::new(InMemoryAuditLog::new());
    let gate = AccessGate::new(config.gate.clone(), Arc::new(directory)).with_audit(audit.clone());

    let actor = if superuser {
        Actor::superuser(1, "cli")
    } else {
        Actor::new(1, "cli")
    };
    let actor = (!anonymous).then_some(&actor);

    let decision = gate.authorize(actor, operation, path);
    let redirect = decision
        .denial()
        .map(|denial| denial.redirect.path(gate.config()).to_string());

    Ok(json!({
        "operation": operation,
        "path": path,
        "result": decision,
        "redirect": redirect,
        "audit": audit.events(),
    }))
}

fn check_window(
    config: &ClinicConfig,
    fixture: &Path,
    request: &WindowRequest,
    now: Option<DateTime<Utc>>,
) -> Result<serde_json::Value, Box<dyn std::error::Error>> {
    let content = fs::read_to_string(fixture)?;
    let appointments: Vec<Appointment> = serde_json::from_str(&content)?;
    tracing::debug!(count = appointments.len(), "fixture loaded");

    let clock: Arc<dyn Clock> = match now {
        Some(instant) => Arc::new(FixedClock::new(instant)),
        None => Arc::new(SystemClock),
    };
    let checker = AvailabilityChecker::new(
        Arc::new(InMemoryAppointmentStore::with_appointments(appointments)),
        config.scheduling,
        clock,
    );

    Ok(match checker.validate_appointment_window(request) {
        Ok(check) => json!({
            "available": check.is_available(),
            "message": check.message(),
            "check": check,
        }),
        Err(err) => json!({
            "available": false,
            "message": err.user_message(),
            "error": err.to_string(),
        }),
    })
}
