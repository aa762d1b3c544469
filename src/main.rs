//! dwc-bridge: inspect and run streaming data-width converter nodes

use std::env;
use std::path::Path;

use anyhow::{anyhow, Context};

use dwc_bridge::config::Config;
use dwc_bridge::cosim::{BehaviouralBackend, CommandBackend, CosimBackend};
use dwc_bridge::manifest::NodeManifest;
use dwc_bridge::{Direction, ExecMode, ExecutionContext, ExecutionEngine, StreamConverterNode, Tensor};

fn main() -> anyhow::Result<()> {
    // Initialize logging
    env_logger::init();

    let args: Vec<String> = env::args().collect();

    if args.iter().any(|a| a == "--sample-config") {
        print!("{}", Config::sample_config());
        return Ok(());
    }

    // Parse options
    let mut codegen = false;
    let mut mode: Option<ExecMode> = None;
    let mut path = None;

    let mut iter = args.iter().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--codegen" => codegen = true,
            "--mode" => {
                let tag = iter.next().ok_or_else(|| anyhow!("--mode needs a value"))?;
                mode = Some(tag.parse()?);
            }
            a if !a.starts_with('-') => path = Some(a),
            other => return Err(anyhow!("unknown option {}", other)),
        }
    }

    let Some(path) = path else {
        print_usage();
        return Ok(());
    };

    let config = Config::get();
    let manifest = NodeManifest::from_file(Path::new(path))?;
    let node = manifest.build_node()?;

    print_summary(&node, config.axi_stream_padding())?;

    println!();
    println!("Verification");
    println!("============");
    for msg in node.verify() {
        println!("  {}", msg);
    }

    if codegen {
        let dir = node
            .npysim_dir()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| config.build_dir());
        println!();
        println!("Code fragments");
        println!("==============");
        for (placeholder, lines) in node.code_gen_fragments(&dir)? {
            println!("{}", placeholder);
            for line in lines {
                println!("    {}", line);
            }
        }
    }

    if let Some(input) = manifest.generate_input(&node)? {
        match config.simulator() {
            Some(sim) => run_node(&node, input, mode, config, CommandBackend::new(sim))?,
            None => run_node(&node, input, mode, config, BehaviouralBackend::new())?,
        }
    }

    Ok(())
}

fn print_usage() {
    println!("Usage: dwc-bridge <node.toml> [--mode functional|cosim] [--codegen]");
    println!("       dwc-bridge --sample-config");
    if let Some(path) = Config::user_config_path() {
        println!();
        println!("User config: {}", path.display());
    }
}

/// Print shapes and widths for a node
fn print_summary(node: &StreamConverterNode, pad: bool) -> anyhow::Result<()> {
    println!("Node: {}", node.name());
    println!("  Datatype:        {}", node.input_datatype());
    println!("  Normal shape:    {}", node.normal_input_shape());
    for (label, dir) in [("Input", Direction::Input), ("Output", Direction::Output)] {
        println!(
            "  {:6} stream:   {:4} bits  folded {}  ({} words)",
            label,
            node.stream_width(dir, pad),
            node.folded_shape(dir)?,
            node.word_count(dir)?
        );
    }
    println!("  Words combined:  {}", node.num_in_words());
    Ok(())
}

/// Execute the node on a generated input and print the result
fn run_node<B: CosimBackend>(
    node: &StreamConverterNode,
    input: Tensor,
    mode: Option<ExecMode>,
    config: &Config,
    backend: B,
) -> anyhow::Result<()> {
    let mut engine = ExecutionEngine::from_config(config, backend)?;
    let input_name = node.input_name()?.to_string();
    let output_name = node.output_name()?.to_string();

    let mut context = ExecutionContext::new();
    context.insert(input_name, input.clone());

    match mode {
        Some(m) => engine.execute(node, &mut context, m),
        None => engine.execute_default(node, &mut context),
    }
    .with_context(|| format!("Executing {}", node.name()))?;

    let output = context
        .get(&output_name)
        .ok_or_else(|| anyhow!("no output tensor {}", output_name))?;

    println!();
    println!("Execution");
    println!("=========");
    println!("  Input:  {:?}", input.data());
    println!("  Output: {:?}", output.data());
    println!(
        "  Identity: {}",
        if output.data() == input.data() { "yes" } else { "NO" }
    );
    Ok(())
}
