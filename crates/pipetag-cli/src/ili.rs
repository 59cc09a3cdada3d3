//! `pipetag generate-ili`.

use anyhow::{Context, Result};
use colored::Colorize;

use pipetag_ili::{
    default_companies, generate_records, parse_inspection_date, preview_csv, write_csv_file,
    IliConfig,
};

use crate::IliArgs;

pub(crate) fn cmd_generate_ili(args: &IliArgs) -> Result<()> {
    let config = IliConfig {
        companies: default_companies(),
        records_per_company: args.records_per_company,
        inspection_date: parse_inspection_date(&args.inspection_date)?,
        seed: args.seed,
    };
    println!(
        "{} {} ILI records for {} companies (seed {})",
        "Generating".green().bold(),
        config.records_per_company * config.companies.len(),
        config.companies.len(),
        config.seed
    );

    let records = generate_records(&config)?;
    if args.preview > 0 {
        print!("{}", preview_csv(&records, args.preview)?);
    }

    if let Some(parent) = args.out.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    write_csv_file(&records, &args.out)?;
    println!("  {} {} ({} rows)", "→".cyan(), args.out.display(), records.len());
    Ok(())
}
