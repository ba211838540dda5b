use clap::Parser;
use plantree::search::{
    heuristics::HeuristicName, planner::PlannerSetting, PlannerConfig, PlannerError, Task,
    Verbosity,
};
use std::{
    path::{Path, PathBuf},
    time::{Duration, Instant},
};
use tracing::{debug, info};

#[derive(Parser)]
#[command(version)]
/// Run the plantree temporal planner on a grounded task.
struct Cli {
    #[arg(help = "The grounded task file (.ron or .json)")]
    task: PathBuf,
    #[arg(
        help = "Planner options in TOML, command line flags take precedence",
        long = "config",
        id = "CONFIG"
    )]
    config: Option<PathBuf>,
    #[arg(
        help = "Prefix of the solution files, solution k is written to <OUTPUT>.<k>",
        short = 'o',
        long = "output",
        id = "OUTPUT",
        default_value = "<task>.plan"
    )]
    output: PathBuf,
    #[arg(
        help = "Wall-clock limit for the whole run, e.g. 30s or 5min",
        short = 't',
        long = "time-limit",
        id = "TIME_LIMIT",
        value_parser = humantime::parse_duration
    )]
    time_limit: Option<Duration>,
    #[arg(
        value_enum,
        help = "The heuristic evaluator to use",
        long = "heuristic",
        id = "HEURISTIC"
    )]
    heuristic: Option<HeuristicName>,
    #[arg(help = "Stop after the first solution", long = "first-solution")]
    first_solution: bool,
    #[arg(
        value_enum,
        help = "The verbosity level",
        short = 'v',
        long = "verbosity",
        id = "VERBOSITY",
        default_value_t = Verbosity::Normal
    )]
    verbosity: Verbosity,
    #[arg(help = "Whether to use coloured output", short = 'c', long = "colour")]
    colour: bool,
}

fn main() -> Result<(), PlannerError> {
    let started = Instant::now();
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(cli.verbosity.env_filter())
        .with_ansi(cli.colour)
        .with_line_number(true)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let mut config = match &cli.config {
        Some(path) => PlannerConfig::load(path)?,
        None => PlannerConfig::default(),
    };
    if let Some(time_limit) = cli.time_limit {
        config = config.with_time_limit(time_limit);
    }
    if let Some(heuristic) = cli.heuristic {
        config.heuristic = heuristic;
    }
    if cli.first_solution {
        config.anytime = false;
    }

    let task = Task::from_path(&cli.task)?;
    info!(
        variables = task.num_variables(),
        actions = task.actions.len(),
        goals = task.goals.len(),
        "task loaded"
    );
    debug!("{}", task.describe());
    let output = if cli.output == Path::new("<task>.plan") {
        cli.task.with_extension("plan")
    } else {
        cli.output.clone()
    };

    let planning_started = Instant::now();
    let mut setting = PlannerSetting::new(task, &config)?;
    let mut solutions = 0;
    let mut best = setting.plan();
    while let Some(id) = best {
        solutions += 1;
        let plan = setting.plan_to_pddl(id);
        info!(
            solution = solutions,
            makespan = plan.makespan(),
            cost = plan.cost(),
            "solution found"
        );
        let text = format!(
            "{plan}\n;Planning time: {:.3}\n;Total time: {:.3}\n;{} expanded nodes\n",
            planning_started.elapsed().as_secs_f64(),
            started.elapsed().as_secs_f64(),
            setting.expanded_nodes()
        );
        let path = PathBuf::from(format!("{}.{solutions}", output.display()));
        std::fs::write(&path, text).map_err(|e| PlannerError::io(&path, e))?;

        if !config.anytime {
            break;
        }
        let node = setting.planner().tree().get(id);
        let (best_g, best_gc) = (node.g, node.gc);
        best = setting.improve_solution(best_g, best_gc, solutions == 1);
    }
    setting.finalise();

    if solutions == 0 {
        info!("no plan found");
    }
    Ok(())
}
