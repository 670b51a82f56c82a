use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use calm_io::stdoutln;
use clap::{arg, crate_version, value_parser, ArgMatches, Command};
use fcnet::connectivity::signed;
use fcnet::dsv::{read_affiliation, read_matrix, stack_tensor};
use fcnet::{
    adjust_partition, deviation, diversity_coefficient, gateway_coefficient, gvc_by_network,
    participation_coefficient, Betweenness, DeviationOptions, NodeStrength, Partition, Sign,
};
use ndarray::{Array1, Array2, Array4, Axis};
use rayon::prelude::*;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the log subscriber. `FCNET_LOG` takes an `EnvFilter` directive;
/// logs go to stderr so that stdout stays tabular.
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_env("FCNET_LOG").unwrap_or_else(|_| EnvFilter::new("fcnet=info,warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact().with_writer(std::io::stderr))
        .init();
}

fn matrix_arg() -> clap::Arg {
    arg!(<MATRIX> "A square, headerless connectivity matrix in acquisition order.")
        .required(true)
        .value_parser(value_parser!(PathBuf))
}

fn affiliation_arg() -> clap::Arg {
    arg!(<AFFILIATION> "One network id per line, numbered from 1, in acquisition order.")
        .required(true)
        .value_parser(value_parser!(PathBuf))
}

fn sign_arg() -> clap::Arg {
    arg!(-s --sign [SIGN] "Which weights to score; signed matrices should be split.")
        .default_value("all")
        .value_parser(["all", "positive", "negative"])
}

fn tasks_arg() -> clap::Arg {
    arg!(-t --tasks <TASKS> "Number of task conditions per subject.")
        .required(true)
        .value_parser(value_parser!(usize))
}

fn matrices_arg() -> clap::Arg {
    arg!(<MATRICES>... "Matrices ordered by subject, then task condition.")
        .required(true)
        .value_parser(value_parser!(PathBuf))
}

/// Create the CLI in clap.
pub fn cli() -> Command {
    Command::new("fcnetis")
        .bin_name("fcnetis")
        .arg_required_else_help(true)
        .subcommand_required(true)
        .version(crate_version!())
        .about("Network partition metrics on functional connectivity matrices.")
        .arg(
            arg!(-d --delimiter [DELIMITER] "Delimiter of the input files; we assume tabs.")
                .global(true)
                .default_value("\t"),
        )
        .subcommand(
            Command::new("partition")
                .about("Print the sorted network boundaries of an affiliation vector.")
                .arg(affiliation_arg())
                .arg(
                    arg!(-o --order "Print the node order instead.")
                        .action(clap::ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("participation")
                .about("Participation coefficient of each node.")
                .arg(matrix_arg())
                .arg(affiliation_arg())
                .arg(sign_arg()),
        )
        .subcommand(
            Command::new("gateway")
                .about("Gateway coefficient of each node.")
                .arg(matrix_arg())
                .arg(affiliation_arg())
                .arg(sign_arg())
                .arg(
                    arg!(-c --centrality [CENTRALITY] "Centrality weighting the coefficient.")
                        .default_value("strength")
                        .value_parser(["strength", "betweenness"]),
                ),
        )
        .subcommand(
            Command::new("diversity")
                .about("Shannon diversity coefficient of each node.")
                .arg(matrix_arg())
                .arg(affiliation_arg())
                .arg(sign_arg()),
        )
        .subcommand(
            Command::new("gvc")
                .about("Global variability coefficient per network and subject.")
                .arg(affiliation_arg())
                .arg(tasks_arg())
                .arg(matrices_arg())
                .arg(
                    arg!(-n --nodes "Print the grand mean of each node instead.")
                        .action(clap::ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("deviation")
                .about("Network partition deviation per network and subject.")
                .arg(affiliation_arg())
                .arg(tasks_arg())
                .arg(matrices_arg())
                .arg(
                    arg!(-m --"mean-first" "Average connectivity across subjects first.")
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(
                    arg!(-r --rest <REST> "A resting-state matrix to adjust the partition with first; repeat once per subject.")
                        .required(false)
                        .num_args(1)
                        .action(clap::ArgAction::Append)
                        .value_parser(value_parser!(PathBuf)),
                ),
        )
        .subcommand(
            Command::new("adjust")
                .about("Adjust a partition to resting-state connectivity by consensus.")
                .arg(affiliation_arg())
                .arg(
                    arg!(<REST>... "Resting-state matrices, one per subject.")
                        .required(true)
                        .value_parser(value_parser!(PathBuf)),
                ),
        )
}

fn delimiter(matches: &ArgMatches) -> u8 {
    match matches.get_one::<String>("delimiter") {
        Some(d) => d.bytes().next().unwrap_or(b'\t'),
        None => b'\t',
    }
}

fn one<'a, T: Clone + Send + Sync + 'static>(matches: &'a ArgMatches, id: &str) -> Result<&'a T> {
    matches
        .get_one::<T>(id)
        .with_context(|| format!("missing argument {id}"))
}

fn paths<'a>(matches: &'a ArgMatches, id: &str) -> Vec<&'a PathBuf> {
    matches
        .get_many::<PathBuf>(id)
        .map(|p| p.collect())
        .unwrap_or_default()
}

fn read_partition(matches: &ArgMatches, delimiter: u8) -> Result<Partition> {
    let path = one::<PathBuf>(matches, "AFFILIATION")?;
    let affiliation = read_affiliation(path, delimiter)
        .with_context(|| format!("reading affiliation {}", path.display()))?;
    Ok(Partition::from_affiliation(affiliation)?)
}

fn read_matrices(paths: &[&PathBuf], delimiter: u8) -> Result<Vec<Array2<f64>>> {
    paths
        .par_iter()
        .map(|p| {
            read_matrix(p, delimiter).with_context(|| format!("reading matrix {}", p.display()))
        })
        .collect()
}

fn read_tensor(matches: &ArgMatches, delimiter: u8) -> Result<Array4<f64>> {
    let tasks = *one::<usize>(matches, "tasks")?;
    let matrices = read_matrices(&paths(matches, "MATRICES"), delimiter)?;
    Ok(stack_tensor(&matrices, tasks)?)
}

/// Read one matrix and sort it into partition order, optionally keeping
/// one sign of weights.
fn read_sorted(matches: &ArgMatches, partition: &Partition, delimiter: u8) -> Result<Array2<f64>> {
    let path = one::<PathBuf>(matches, "MATRIX")?;
    let raw = read_matrix(path, delimiter)
        .with_context(|| format!("reading matrix {}", path.display()))?;
    let sorted = partition.order().sort_matrix(&raw.view());
    Ok(match one::<String>(matches, "sign")?.as_str() {
        "positive" => signed(&sorted.view(), Sign::Positive),
        "negative" => signed(&sorted.view(), Sign::Negative),
        _ => sorted,
    })
}

/// One row per node, in partition order.
fn print_nodes(partition: &Partition, name: &str, scores: &Array1<f64>) -> Result<()> {
    let sorted_ids = partition.boundaries().sorted_ids();
    stdoutln!("node\tnetwork\t{}", name)?;
    for (position, &node) in partition.order().indices().iter().enumerate() {
        stdoutln!("{}\t{}\t{}", node, sorted_ids[position] + 1, scores[position])?;
    }
    Ok(())
}

/// One row per network, one column per subject.
fn print_networks(scores: &Array2<f64>) -> Result<()> {
    let header: Vec<String> = (1..=scores.ncols()).map(|s| format!("subject_{s}")).collect();
    stdoutln!("network\t{}", header.join("\t"))?;
    for (network, row) in scores.rows().into_iter().enumerate() {
        let cells: Vec<String> = row.iter().map(|v| v.to_string()).collect();
        stdoutln!("{}\t{}", network + 1, cells.join("\t"))?;
    }
    Ok(())
}

/// Process all of the matches from the CLI.
pub fn process_matches(matches: &ArgMatches) -> Result<()> {
    let delimiter = delimiter(matches);

    match matches.subcommand() {
        Some(("partition", sub_matches)) => {
            let partition = read_partition(sub_matches, delimiter)?;
            if *one::<bool>(sub_matches, "order")? {
                stdoutln!("position\tnode")?;
                for (position, node) in partition.order().indices().iter().enumerate() {
                    stdoutln!("{}\t{}", position, node)?;
                }
            } else {
                stdoutln!("network\tstart\tend\tsize")?;
                for (network, range) in partition.boundaries().iter().enumerate() {
                    stdoutln!(
                        "{}\t{}\t{}\t{}",
                        network + 1,
                        range.start,
                        range.end,
                        range.size
                    )?;
                }
            }
        }
        Some(("participation", sub_matches)) => {
            let partition = read_partition(sub_matches, delimiter)?;
            let sorted = read_sorted(sub_matches, &partition, delimiter)?;
            let pc = participation_coefficient(&sorted.view(), &partition.sorted_affiliation())?;
            print_nodes(&partition, "participation", &pc)?;
        }
        Some(("gateway", sub_matches)) => {
            let partition = read_partition(sub_matches, delimiter)?;
            let sorted = read_sorted(sub_matches, &partition, delimiter)?;
            let affiliation = partition.sorted_affiliation();
            let gc = match one::<String>(sub_matches, "centrality")?.as_str() {
                "betweenness" => gateway_coefficient(&sorted.view(), &affiliation, &Betweenness)?,
                _ => gateway_coefficient(&sorted.view(), &affiliation, &NodeStrength)?,
            };
            print_nodes(&partition, "gateway", &gc)?;
        }
        Some(("diversity", sub_matches)) => {
            let partition = read_partition(sub_matches, delimiter)?;
            let sorted = read_sorted(sub_matches, &partition, delimiter)?;
            let dc = diversity_coefficient(&sorted.view(), &partition.sorted_affiliation())?;
            print_nodes(&partition, "diversity", &dc)?;
        }
        Some(("gvc", sub_matches)) => {
            let partition = read_partition(sub_matches, delimiter)?;
            let fc = read_tensor(sub_matches, delimiter)?;
            let scores = gvc_by_network(&fc.view(), &partition)?;
            if *one::<bool>(sub_matches, "nodes")? {
                print_nodes(&partition, "gvc", &scores.nodes)?;
            } else {
                print_networks(&scores.networks_subjects)?;
            }
        }
        Some(("deviation", sub_matches)) => {
            let mut partition = read_partition(sub_matches, delimiter)?;
            let fc = read_tensor(sub_matches, delimiter)?;

            let rest = paths(sub_matches, "rest");
            if !rest.is_empty() {
                let rest_fc = stack_tensor(&read_matrices(&rest, delimiter)?, rest.len())?;
                // one task axis holding every subject; move subjects last
                let rest_fc = rest_fc.index_axis_move(Axis(3), 0);
                partition = adjust_partition(&rest_fc.view(), &partition)?.partition;
            }

            let options = DeviationOptions {
                mean_first: *one::<bool>(sub_matches, "mean-first")?,
            };
            let result = deviation(&fc.view(), &partition, options)?;
            if !result.shortfalls.is_empty() {
                tracing::warn!(
                    count = result.shortfalls.len(),
                    "clustered affinity rows fell short of 100%"
                );
            }
            print_networks(&result.deviation)?;
        }
        Some(("adjust", sub_matches)) => {
            let partition = read_partition(sub_matches, delimiter)?;
            let rest = paths(sub_matches, "REST");
            if rest.is_empty() {
                bail!("at least one resting-state matrix is needed");
            }
            let rest_fc = stack_tensor(&read_matrices(&rest, delimiter)?, rest.len())?;
            let rest_fc = rest_fc.index_axis_move(Axis(3), 0);
            let consensus = adjust_partition(&rest_fc.view(), &partition)?;

            let original = partition.boundaries().sorted_ids();
            stdoutln!("node\toriginal\tmodal\tadjusted\tpercent_agree")?;
            for (position, &node) in partition.order().indices().iter().enumerate() {
                stdoutln!(
                    "{}\t{}\t{}\t{}\t{}",
                    node,
                    original[position] + 1,
                    consensus.modal_networks[position] + 1,
                    consensus.adjusted_ids[position] + 1,
                    consensus.percent_agree[position] * 100.0
                )?;
            }
        }
        _ => unreachable!("Should never reach here."),
    }

    Ok(())
}
