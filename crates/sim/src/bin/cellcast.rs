//! multicast cell simulation sweep

use anyhow::Result;
use cellcast_sim::{scenarios, ChannelPresets};
use colored::Colorize;

fn main() -> Result<()> {
    cellcast_sim::init_logging();

    println!("{}", "Cellcast Multicast Simulation".bright_blue().bold());
    println!("{}", "=============================".bright_blue());
    println!();

    let presets = vec![
        ("Clear Sky", ChannelPresets::clear_sky()),
        ("Urban Macro", ChannelPresets::urban_macro()),
        ("Cell Edge", ChannelPresets::cell_edge()),
    ];

    let num_stations = 10;
    let seed = 42;

    for (name, config) in presets {
        println!("{}", format!("\n>>> Conditions: {}", name).bright_green().bold());
        println!("Bandwidth: {} bps", config.bandwidth_bps);
        println!("Packet Loss: {}%", (config.packet_loss * 100.0) as u32);
        println!("Latency: {:?}", config.latency);
        println!("Frame: {:?} x {} blocks", config.frame_duration, config.blocks_per_frame);

        let multicast = scenarios::multicast_cell(config.clone(), num_stations, seed)?;
        scenarios::group_churn(config.clone(), num_stations, seed)?;
        let unicast = scenarios::unicast_baseline(config, num_stations, seed)?;

        println!(
            "\n{} multicast sent {} flows for {} receptions; unicast needed {} flows for {}",
            "Comparison:".bright_yellow(),
            multicast.sends,
            multicast.deliveries,
            unicast.sends,
            unicast.deliveries
        );
        println!("{}", "-".repeat(50));
    }

    println!("{}", "\n>>> Mobility: walking out of coverage".bright_red().bold());
    scenarios::edge_walkout(num_stations, seed)?;

    println!("\n{}", "All simulations complete!".bright_green().bold());
    Ok(())
}
