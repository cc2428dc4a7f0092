use clap::Parser;
use edentity_galaxy::{
    Cli, EdentityError, EdentityGalaxy, JobReport, JobRequest, OutputFormatter, OutputMode,
    UserFriendlyError,
};
use std::process;

#[tokio::main]
async fn main() {
    let exit_code = run().await;
    process::exit(exit_code);
}

async fn run() -> i32 {
    let cli = Cli::parse();

    if cli.generate_config {
        return handle_generate_config(&cli);
    }

    let app = match EdentityGalaxy::from_cli(&cli) {
        Ok(app) => app,
        Err(e) => {
            print_startup_error(&e);
            return e.exit_code();
        }
    };

    let request = match cli.job_request() {
        Ok(request) => request,
        Err(e) => {
            app.handle_error(&e);
            return e.exit_code();
        }
    };

    if let Some(ref prefix) = cli.conda_prefix {
        app.output_formatter()
            .debug(&format!("Conda prefix: {}", prefix.display()));
    }

    if cli.dry_run {
        return handle_dry_run(&app, &request);
    }

    let mut report = JobReport::new(&request.project_name, &request.archive);
    let outcome = app.execute(&request, &mut report).await;

    if let Some(ref path) = cli.job_report {
        if let Err(e) = report.save_json(path) {
            app.output_formatter()
                .warning(&format!("Could not write job report: {}", e.user_message()));
        }
    }

    match outcome {
        Ok(()) => {
            app.output_formatter().print_job_report(&report);
            0
        }
        Err(e) => {
            app.handle_error(&e);
            e.exit_code()
        }
    }
}

fn handle_generate_config(cli: &Cli) -> i32 {
    let config_path = cli
        .config
        .as_ref()
        .map(|p| p.to_string_lossy().to_string())
        .unwrap_or_else(|| "edentity-galaxy.toml".to_string());

    match EdentityGalaxy::generate_sample_config(&config_path) {
        Ok(()) => {
            println!("Generated sample configuration file: {}", config_path);
            println!("\nTo use this configuration:");
            println!("  edentity-galaxy --config {} --project_name ...", config_path);
            0
        }
        Err(e) => {
            eprintln!("Failed to generate configuration file: {}", e.user_message());
            if let Some(suggestion) = e.suggestion() {
                eprintln!("Suggestion: {}", suggestion);
            }
            e.exit_code()
        }
    }
}

fn handle_dry_run(app: &EdentityGalaxy, request: &JobRequest) -> i32 {
    let formatter = app.output_formatter();

    formatter.info("DRY RUN MODE - nothing will be staged or run");
    formatter.print_separator();

    if !request.archive.is_file() {
        formatter.warning(&format!(
            "Input archive does not exist yet: {}",
            request.archive.display()
        ));
    }

    let config = app.config();
    formatter.info("Job plan:");
    println!("  Project:           {}", request.project_name);
    println!("  Archive:           {}", request.archive.display());
    println!("  Staging directory: {}", config.staging_dir(app.base_dir()).display());
    println!("  Work directory:    {}", request.work_dir(app.base_dir()).display());
    println!("  On tool failure:   {:?}", config.pipeline.on_tool_failure);
    println!("  On collision:      {:?}", config.staging.on_collision);
    println!();
    println!("{}", app.planned_command_line(request).join(" "));

    formatter.print_separator();
    formatter.success("Dry run completed successfully");

    0
}

fn print_startup_error(error: &EdentityError) {
    let formatter = OutputFormatter::new(OutputMode::Human, 0, false);
    formatter.print_user_friendly_error(error);
}
