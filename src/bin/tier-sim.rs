use tier_sim::config::{self, Command, FormatArg};
use tier_sim::engine;
use tier_sim::error::Result;
use tier_sim::logging;
use tier_sim::output::{
    self, CsvFormatter, Formatter, HumanFormatter, JsonFormatter, SummaryFormatter,
};

fn main() {
    if let Err(err) = run() {
        eprintln!("Error: {}", err);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = config::parse_args()?;
    match cli.command {
        Command::Run(args) => {
            logging::init_logging(&args.log_level);
            let (config, format) = config::build_config(args)?;
            let result = engine::run_simulation(&config)?;

            let formatter = formatter_for(&format);
            print!("{}", formatter.write(&result)?);
        }
        Command::ShowConfig(args) => {
            let (config, _) = config::build_config(args)?;
            print!("{}", output::describe_config(&config)?);
        }
    }

    Ok(())
}

fn formatter_for(format: &FormatArg) -> Box<dyn Formatter> {
    match format {
        FormatArg::Human => Box::new(HumanFormatter),
        FormatArg::Summary => Box::new(SummaryFormatter),
        FormatArg::Json => Box::new(JsonFormatter),
        FormatArg::Csv => Box::new(CsvFormatter),
    }
}
