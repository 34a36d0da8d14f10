use anyhow::{Context, Result, anyhow};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use serde::Serialize;

use labstaff::config::AppConfig;
use labstaff::models::{CareerStepKind, Employee, Laboratory, PermanentEmployee};
use labstaff::{Database, EligibilityEngine, OrgService, telemetry};

#[derive(Parser)]
#[command(name = "labstaff")]
#[command(about = "Staff, laboratory and project records with eligibility queries")]
struct Cli {
    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database
    Init,

    /// List permanent employees
    Employees {
        /// Include employees who have left
        #[arg(short, long)]
        all: bool,
    },

    /// Show an employee with affiliations, roles and career history
    Employee {
        /// Matricola
        matricola: String,
    },

    /// List candidates for a role or career step
    Candidates {
        #[command(subcommand)]
        command: CandidateCommands,
    },

    /// Show equipment and contracted staff totals for a project
    Costs {
        /// Project CUP
        cup: String,
    },

    /// List laboratories by collaboration with a project
    Labs {
        #[command(subcommand)]
        command: LabCommands,
    },

    /// Record a career step for a permanent employee
    Step {
        /// Matricola
        matricola: String,

        /// Middle, Senior, Promosso_a_dirigente or Rimosso_da_dirigente
        #[arg(value_parser = parse_step)]
        kind: CareerStepKind,

        /// Effective date (YYYY-MM-DD), defaults to today
        #[arg(short, long, value_parser = parse_date)]
        date: Option<NaiveDate>,
    },

    /// Dump every record and relation as JSON
    Export,
}

#[derive(Subcommand)]
enum CandidateCommands {
    /// Active senior employees
    Director,

    /// Scientific referent candidates for a project's dates
    Referent {
        /// Project start date (YYYY-MM-DD)
        #[arg(long, value_parser = parse_date)]
        start: NaiveDate,

        /// Project end date (YYYY-MM-DD), omit for open-ended projects
        #[arg(long, value_parser = parse_date)]
        end: Option<NaiveDate>,
    },

    /// Project owner candidates for a project's dates
    Owner {
        /// Project start date (YYYY-MM-DD)
        #[arg(long, value_parser = parse_date)]
        start: NaiveDate,

        /// Project end date (YYYY-MM-DD), omit for open-ended projects
        #[arg(long, value_parser = parse_date)]
        end: Option<NaiveDate>,
    },

    /// Employees who could receive a career step
    Step {
        #[arg(value_parser = parse_step)]
        kind: CareerStepKind,
    },
}

#[derive(Subcommand)]
enum LabCommands {
    /// Laboratories not yet collaborating on the project
    Eligible { cup: String },

    /// Laboratories collaborating on the project
    Working { cup: String },
}

#[derive(Serialize)]
struct CostReport<'a> {
    cup: &'a str,
    equipment: Option<Decimal>,
    staff: Option<Decimal>,
}

fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}

fn parse_step(raw: &str) -> Result<CareerStepKind, String> {
    raw.parse::<CareerStepKind>().map_err(|err| err.to_string())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    let db = Database::open(&config.database_path).with_context(|| {
        format!("Failed to open database at {}", config.database_path.display())
    })?;

    if !matches!(cli.command, Commands::Init) {
        db.ensure_initialized()?;
    }
    let engine = EligibilityEngine::new(&db);

    match cli.command {
        Commands::Init => {
            db.init()?;
            println!("Database initialized at {}", config.database_path.display());
        }

        Commands::Employees { all } => {
            let employees = db.list_permanent_employees(!all)?;
            print_employees(&employees, cli.json)?;
        }

        Commands::Employee { matricola } => {
            let org = db.load_organization()?;
            let employee = org
                .employee(&matricola)
                .ok_or_else(|| anyhow!("Employee {} not found", matricola))?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&employee)?);
                return Ok(());
            }

            let person = employee.person();
            println!("Employee {}", employee.matricola());
            println!("Name: {}", employee.full_name());
            println!("Fiscal code: {}", employee.fiscal_code());
            if let Some(address) = &person.address {
                println!("Address: {}", address);
            }
            println!("Born: {}", person.birth_date);
            println!("Hired: {}", employee.hire_date());

            match &employee {
                Employee::Permanent(e) => {
                    println!("Seniority: {}", e.seniority);
                    println!("Director: {}", if e.director { "yes" } else { "no" });
                    if let Some(end) = e.end_date {
                        println!("Left: {}", end);
                    }

                    let labs = org.laboratories_of(&matricola);
                    if !labs.is_empty() {
                        println!("\nLaboratories ({}):", labs.len());
                        for lab in labs {
                            let role = if lab.director == matricola { " (director)" } else { "" };
                            println!("  {} - {}{}", lab.name, lab.topic, role);
                        }
                    }

                    for (label, projects) in [
                        ("Referent of", org.projects_referenced_by(&matricola)),
                        ("Owner of", org.projects_owned_by(&matricola)),
                    ] {
                        if !projects.is_empty() {
                            println!("\n{}:", label);
                            for project in projects {
                                println!("  {} - {}", project.cup, project.name);
                            }
                        }
                    }

                    let career = org.career_of(&matricola);
                    if !career.is_empty() {
                        println!("\nCareer:");
                        for step in career {
                            println!("  {} {}", step.date, step.kind);
                        }
                    }
                }
                Employee::Contracted(e) => {
                    println!("Project: {}", e.project);
                    println!("Contract ends: {}", e.contract_end);
                    println!("Cost: {}", e.cost);
                }
            }
        }

        Commands::Candidates { command } => {
            let candidates = match command {
                CandidateCommands::Director => engine.candidates_for_scientific_director()?,
                CandidateCommands::Referent { start, end } => {
                    engine.candidates_for_scientific_referent(start, end)?
                }
                CandidateCommands::Owner { start, end } => {
                    engine.candidates_for_project_owner(start, end)?
                }
                CandidateCommands::Step { kind } => engine.candidates_for_career_step(kind)?,
            };
            print_employees(&candidates, cli.json)?;
        }

        Commands::Costs { cup } => {
            let report = CostReport {
                cup: &cup,
                equipment: engine.total_equipment_cost(&cup)?,
                staff: engine.total_staff_cost(&cup)?,
            };
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("Project {}", report.cup);
                println!("Equipment: {}", format_total(report.equipment));
                println!("Staff:     {}", format_total(report.staff));
            }
        }

        Commands::Labs { command } => {
            let labs = match command {
                LabCommands::Eligible { cup } => engine.laboratories_eligible_for_project(&cup)?,
                LabCommands::Working { cup } => engine.laboratories_working_on_project(&cup)?,
            };
            print_laboratories(&labs, cli.json)?;
        }

        Commands::Step {
            matricola,
            kind,
            date,
        } => {
            let date = date.unwrap_or_else(|| Local::now().date_naive());
            let step = OrgService::new(&db).record_career_step(&matricola, kind, date)?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&step)?);
            } else {
                println!("Recorded {} for {} on {} (step #{})", step.kind, matricola, step.date, step.id);
            }
        }

        Commands::Export => {
            let org = db.load_organization()?;
            println!("{}", serde_json::to_string_pretty(&org)?);
        }
    }

    Ok(())
}

fn format_total(total: Option<Decimal>) -> String {
    match total {
        Some(value) => value.to_string(),
        None => "no records".to_string(),
    }
}

fn print_employees(employees: &[PermanentEmployee], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(employees)?);
        return Ok(());
    }
    if employees.is_empty() {
        println!("No employees found.");
        return Ok(());
    }

    println!(
        "{:<10} {:<28} {:<8} {:<5} {:<10} {:<10}",
        "MATRICOLA", "NAME", "LEVEL", "DIR", "HIRED", "LEFT"
    );
    println!("{}", "-".repeat(76));
    for e in employees {
        let name = format!("{} {}", e.person.name, e.person.surname);
        println!(
            "{:<10} {:<28} {:<8} {:<5} {:<10} {:<10}",
            e.person.matricola,
            truncate(&name, 26),
            e.seniority,
            if e.director { "yes" } else { "no" },
            e.person.hire_date,
            e.end_date.map(|d| d.to_string()).unwrap_or_else(|| "-".to_string()),
        );
    }
    Ok(())
}

fn print_laboratories(labs: &[Laboratory], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(labs)?);
        return Ok(());
    }
    if labs.is_empty() {
        println!("No laboratories found.");
        return Ok(());
    }

    println!("{:<24} {:<36} {:<10}", "NAME", "TOPIC", "DIRECTOR");
    println!("{}", "-".repeat(72));
    for lab in labs {
        println!(
            "{:<24} {:<36} {:<10}",
            truncate(&lab.name, 22),
            truncate(&lab.topic, 34),
            lab.director
        );
    }
    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
