// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use clap::{Arg, ArgAction, Command, crate_version};

fn json_flags(cmd: Command) -> Command {
    cmd.arg(
        Arg::new("json")
            .long("json")
            .action(ArgAction::SetTrue)
            .help("Print as pretty JSON"),
    )
    .arg(
        Arg::new("jsonl")
            .long("jsonl")
            .action(ArgAction::SetTrue)
            .help("Print as JSON lines"),
    )
}

pub fn build_cli() -> Command {
    Command::new("feeclip")
        .version(crate_version!())
        .about("Intermediary fee & commission calculation: tiered rates, VAT, credit offsets")
        .subcommand_required(false)
        .subcommand(Command::new("init").about("Initialize the database"))
        .subcommand(
            Command::new("rule")
                .about("Manage commission rules")
                .subcommand(
                    Command::new("add")
                        .about("Add a commission rule")
                        .arg(Arg::new("entity_type").long("entity-type").required(true)
                            .value_parser(["distributor", "referrer", "partner"]))
                        .arg(Arg::new("entity_name").long("entity-name")
                            .help("Omit for a wildcard default rule"))
                        .arg(Arg::new("type").long("type").required(true)
                            .value_parser(["percentage", "fixed_amount", "tiered", "hybrid", "conditional"]))
                        .arg(Arg::new("rate").long("rate")
                            .help("Fractional rate, e.g. 0.02; omit to defer to the party's agreement"))
                        .arg(Arg::new("fixed_amount").long("fixed-amount"))
                        .arg(Arg::new("min").long("min").help("Minimum fee cap"))
                        .arg(Arg::new("max").long("max").help("Maximum fee cap"))
                        .arg(Arg::new("scope").long("scope").required(true)
                            .value_parser(["fund", "deal"]))
                        .arg(Arg::new("deal_id").long("deal-id"))
                        .arg(Arg::new("fund").long("fund")
                            .help("Constrain the rule to one fund"))
                        .arg(Arg::new("priority").long("priority").default_value("0")
                            .value_parser(clap::value_parser!(i32)))
                        .arg(Arg::new("vat_mode").long("vat-mode").default_value("on_top")
                            .value_parser(["included", "on_top"]))
                        .arg(Arg::new("vat_country").long("vat-country"))
                        .arg(Arg::new("tier_mode").long("tier-mode")
                            .value_parser(["stepped", "threshold"])),
                )
                .subcommand(json_flags(
                    Command::new("list")
                        .about("List rules")
                        .arg(Arg::new("entity_type").long("entity-type")
                            .value_parser(["distributor", "referrer", "partner"]))
                        .arg(Arg::new("archived").long("archived").action(ArgAction::SetTrue)
                            .help("Include archived rules")),
                ))
                .subcommand(
                    Command::new("add-tier")
                        .about("Add a tier band to a tiered rule")
                        .arg(Arg::new("rule").long("rule").required(true)
                            .value_parser(clap::value_parser!(i64)))
                        .arg(Arg::new("order").long("order").required(true)
                            .value_parser(clap::value_parser!(i32)))
                        .arg(Arg::new("min").long("min").required(true))
                        .arg(Arg::new("max").long("max")
                            .help("Omit for the unbounded top band"))
                        .arg(Arg::new("rate").long("rate").default_value("0"))
                        .arg(Arg::new("fixed_amount").long("fixed-amount"))
                        .arg(Arg::new("description").long("description")),
                )
                .subcommand(
                    Command::new("add-condition")
                        .about("Add a condition branch to a conditional rule")
                        .arg(Arg::new("rule").long("rule").required(true)
                            .value_parser(clap::value_parser!(i64)))
                        .arg(Arg::new("order").long("order").required(true)
                            .value_parser(clap::value_parser!(i32)))
                        .arg(Arg::new("min").long("min"))
                        .arg(Arg::new("max").long("max"))
                        .arg(Arg::new("rate").long("rate").required(true))
                        .arg(Arg::new("description").long("description")),
                )
                .subcommand(
                    Command::new("tiers")
                        .about("Show a rule's tier table")
                        .arg(Arg::new("rule").long("rule").required(true)
                            .value_parser(clap::value_parser!(i64))),
                )
                .subcommand(
                    Command::new("archive")
                        .about("Archive a rule (kept for audit, excluded from runs)")
                        .arg(Arg::new("rule").long("rule").required(true)
                            .value_parser(clap::value_parser!(i64))),
                ),
        )
        .subcommand(
            Command::new("vat")
                .about("Manage VAT rates")
                .subcommand(
                    Command::new("set")
                        .about("Add a VAT rate window for a country")
                        .arg(Arg::new("country").long("country").required(true))
                        .arg(Arg::new("rate").long("rate").required(true))
                        .arg(Arg::new("from").long("from").required(true))
                        .arg(Arg::new("to").long("to"))
                        .arg(Arg::new("default").long("default").action(ArgAction::SetTrue)
                            .help("Use this rate when no country matches")),
                )
                .subcommand(json_flags(Command::new("list").about("List VAT rates"))),
        )
        .subcommand(
            Command::new("credit")
                .about("Manage prepaid credits")
                .subcommand(
                    Command::new("add")
                        .about("Post a credit for an investor")
                        .arg(Arg::new("investor").long("investor").required(true))
                        .arg(Arg::new("amount").long("amount").required(true))
                        .arg(Arg::new("date").long("date").required(true))
                        .arg(Arg::new("fund").long("fund"))
                        .arg(Arg::new("scope").long("scope").default_value("fund")
                            .value_parser(["fund", "deal"]))
                        .arg(Arg::new("deal_id").long("deal-id")),
                )
                .subcommand(json_flags(
                    Command::new("list")
                        .about("List credits")
                        .arg(Arg::new("investor").long("investor")),
                )),
        )
        .subcommand(
            Command::new("track")
                .about("Manage shared rate tracks")
                .subcommand(
                    Command::new("set")
                        .about("Create or update a rate track")
                        .arg(Arg::new("key").long("key").required(true))
                        .arg(Arg::new("upfront").long("upfront").required(true))
                        .arg(Arg::new("deferred").long("deferred").required(true))
                        .arg(Arg::new("expected_min").long("expected-min"))
                        .arg(Arg::new("expected_max").long("expected-max")),
                )
                .subcommand(json_flags(Command::new("list").about("List rate tracks"))),
        )
        .subcommand(
            Command::new("agreement")
                .about("Manage commercial agreements")
                .subcommand(
                    Command::new("add")
                        .about("Add an agreement for a party")
                        .arg(Arg::new("party").long("party").required(true))
                        .arg(Arg::new("scope").long("scope").required(true)
                            .value_parser(["fund", "deal"]))
                        .arg(Arg::new("fund").long("fund"))
                        .arg(Arg::new("deal_id").long("deal-id"))
                        .arg(Arg::new("from").long("from").required(true))
                        .arg(Arg::new("to").long("to"))
                        .arg(Arg::new("inherit").long("inherit-fund-rates")
                            .action(ArgAction::SetTrue))
                        .arg(Arg::new("track").long("track"))
                        .arg(Arg::new("upfront").long("upfront"))
                        .arg(Arg::new("deferred").long("deferred"))
                        .arg(Arg::new("vat_mode").long("vat-mode").default_value("on_top")
                            .value_parser(["included", "on_top"])),
                )
                .subcommand(json_flags(Command::new("list").about("List agreements")))
                .subcommand(
                    Command::new("rates")
                        .about("Resolve an agreement's effective rates")
                        .arg(Arg::new("id").long("id").required(true)
                            .value_parser(clap::value_parser!(i64)))
                        .arg(Arg::new("as_of").long("as-of")
                            .help("Resolution date, defaults to today")),
                ),
        )
        .subcommand(
            Command::new("contribution")
                .about("Manage contribution events")
                .subcommand(
                    Command::new("add")
                        .about("Record a capital contribution")
                        .arg(Arg::new("investor").long("investor").required(true))
                        .arg(Arg::new("fund").long("fund").required(true))
                        .arg(Arg::new("amount").long("amount").required(true))
                        .arg(Arg::new("date").long("date").required(true))
                        .arg(Arg::new("deal_id").long("deal-id"))
                        .arg(Arg::new("deal_code").long("deal-code"))
                        .arg(Arg::new("deal_name").long("deal-name"))
                        .arg(Arg::new("distributor").long("distributor"))
                        .arg(Arg::new("referrer").long("referrer"))
                        .arg(Arg::new("partner").long("partner")),
                )
                .subcommand(json_flags(
                    Command::new("list")
                        .about("List contributions")
                        .arg(Arg::new("fund").long("fund"))
                        .arg(Arg::new("month").long("month").help("YYYY-MM")),
                )),
        )
        .subcommand(
            Command::new("import")
                .about("Import data from files")
                .subcommand(
                    Command::new("contributions")
                        .about("Import contributions from CSV")
                        .arg(Arg::new("path").long("path").required(true)),
                ),
        )
        .subcommand(
            Command::new("run")
                .about("Calculate and inspect fee runs")
                .subcommand(json_flags(
                    Command::new("calc")
                        .about("Run the fee calculation over stored contributions")
                        .arg(Arg::new("as_of").long("as-of").required(true))
                        .arg(Arg::new("fund").long("fund"))
                        .arg(Arg::new("month").long("month").help("YYYY-MM")),
                ))
                .subcommand(json_flags(Command::new("list").about("List past runs")))
                .subcommand(json_flags(
                    Command::new("show")
                        .about("Show a run's fee lines and totals")
                        .arg(Arg::new("id").long("id").required(true)),
                )),
        )
        .subcommand(
            Command::new("export")
                .about("Export run output")
                .subcommand(
                    Command::new("lines")
                        .about("Export a run's fee lines")
                        .arg(Arg::new("run").long("run").required(true))
                        .arg(Arg::new("format").long("format").default_value("csv")
                            .value_parser(["csv", "json"]))
                        .arg(Arg::new("out").long("out").required(true)),
                ),
        )
        .subcommand(Command::new("doctor").about("Check configuration for problems"))
}
