use clap::Parser;
use mender::cli::commands::memory::MemoryCommands;
use mender::cli::{Cli, Commands};

#[test]
fn test_parse_run_with_overrides() {
    let cli = Cli::try_parse_from([
        "mender",
        "run",
        "fix the parser",
        "add a test",
        "--max-iterations",
        "4",
        "--guard-mode",
        "block",
        "--capacity",
        "3",
    ])
    .unwrap();

    match cli.command {
        Commands::Run(args) => {
            assert_eq!(args.goals, vec!["fix the parser", "add a test"]);
            assert_eq!(args.max_iterations, Some(4));
            assert_eq!(args.guard_mode.as_deref(), Some("block"));
            assert_eq!(args.capacity, Some(3));
            assert!(args.problem_type.is_none());
        }
        _ => panic!("Wrong top-level command"),
    }
}

#[test]
fn test_run_requires_a_goal() {
    assert!(Cli::try_parse_from(["mender", "run"]).is_err());
}

#[test]
fn test_global_flags_after_subcommand() {
    let cli = Cli::try_parse_from([
        "mender",
        "memory",
        "failures",
        "--signature",
        "TIMEOUT",
        "--json",
        "--config",
        "custom.yaml",
    ])
    .unwrap();

    assert!(cli.json);
    assert_eq!(cli.config.as_deref(), Some(std::path::Path::new("custom.yaml")));
    match cli.command {
        Commands::Memory(args) => match args.command {
            MemoryCommands::Failures { signature } => {
                assert_eq!(signature.as_deref(), Some("TIMEOUT"));
            }
            _ => panic!("Wrong memory command"),
        },
        _ => panic!("Wrong top-level command"),
    }
}

#[test]
fn test_parse_init_defaults() {
    let cli = Cli::try_parse_from(["mender", "init"]).unwrap();
    match cli.command {
        Commands::Init(args) => {
            assert!(!args.force);
            assert_eq!(args.path, std::path::PathBuf::from("."));
        }
        _ => panic!("Wrong top-level command"),
    }
}

#[test]
fn test_parse_analyze() {
    let cli = Cli::try_parse_from(["mender", "analyze", "candidate.py"]).unwrap();
    assert!(matches!(cli.command, Commands::Analyze(args) if args.file.ends_with("candidate.py")));
}

#[test]
fn test_parse_optimize_write() {
    let cli = Cli::try_parse_from(["mender", "optimize", "--write", "candidate.py"]).unwrap();
    match cli.command {
        Commands::Optimize(args) => {
            assert!(args.write);
            assert!(args.file.ends_with("candidate.py"));
        }
        _ => panic!("Wrong top-level command"),
    }
}
