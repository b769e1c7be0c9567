use std::path::Path;

use atmoslink_core::{BeamDetails, ChannelLayout};

fn format_correlation(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |c| format!("{c:+.3}"))
}

pub fn run(channel_filter: Option<&str>, data_dir: &str, output_path: Option<&str>) {
    let channels = super::parse_channels(channel_filter);
    if channels.is_empty() {
        eprintln!("No channels selected.");
        std::process::exit(1);
    }

    let mut all_details = Vec::new();
    for channel in &channels {
        let layout = ChannelLayout::new(Path::new(data_dir), channel);
        let details = match BeamDetails::load(&layout) {
            Ok(details) => details,
            Err(e) => {
                eprintln!("  {channel}: FAILED: {e}");
                continue;
            }
        };

        println!("  {channel}");
        let x = &details.centroid_x;
        println!(
            "    centroid x: mean={:+.3e}  var={:.3e}  skew={:+.3}  kurt={:+.3}",
            x.mean, x.variance, x.skewness, x.excess_kurtosis
        );
        println!(
            "    corr(r0, W2_r)={}  corr(x0, W2_1)={}  corr(x0, W2_2)={}",
            format_correlation(details.r0_w2r_correlation),
            format_correlation(details.x0_w2i_correlation[0]),
            format_correlation(details.x0_w2i_correlation[1])
        );
        for (label, stats) in ["sum", "difference"].iter().zip(&details.rotated_theta) {
            println!(
                "    theta {label:<10} mean={:+.3}  var={:.3e}  skew={:+.3}  kurt={:+.3}",
                stats.mean, stats.variance, stats.skewness, stats.excess_kurtosis
            );
        }
        println!(
            "    {:<12} {:>10} {:>12} {:>12}",
            "Aperture", "a/sqrt(lt2)", "corr(r0,T)", "tracked"
        );
        for (plain, tracked) in details.r0_eta.iter().zip(&details.r0_eta_tracked) {
            println!(
                "    {:<12} {:>10.3} {:>12} {:>12}",
                plain.aperture_radius,
                plain.normed_radius,
                format_correlation(plain.correlation),
                format_correlation(tracked.correlation)
            );
        }
        all_details.push(details);
    }

    if all_details.is_empty() {
        eprintln!("No channel could be loaded.");
        std::process::exit(1);
    }
    if let Some(path) = output_path {
        super::write_json(path, &all_details);
    }
}
