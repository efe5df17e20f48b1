use clap::Parser;

use sim_lib::error::SimulatorResult;
use sim_lib::flags::Args;
use sim_lib::pipeline::Policy;
use sim_lib::Pipeline;

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn run() -> SimulatorResult<()> {
    let args = Args::parse();

    let policy = Policy { verbose: args.verbose, history: args.history };
    let mut sim = Pipeline::new(args.mem_size, args.mem_latency, policy);

    if args.fp {
        for spec in &args.units {
            sim.init_exec_unit(spec.kind, spec.latency, spec.instances);
        }
    } else {
        sim.init_exec_unit(sim_lib::functional_unit::UnitKind::Integer, 1, 1);
    }

    sim.load_program(&args.program, args.base_address)?;
    sim.run(args.cycles);

    if args.verbose {
        sim.print_registers();
    }

    Ok(())
}
