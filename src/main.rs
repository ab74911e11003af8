use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use tabled::{settings::Style, Table, Tabled};

use unitbook::config::{self, init_config_dir, load_config, resolve_output_dir, store_path};
use unitbook::error::{LedgerError, Result};
use unitbook::export::{
    self, ClientFilter, DueWindow, InvoiceFilter, PaymentFilter, UnitFilter,
};
use unitbook::format::{format_date, format_money, format_opt_date, format_whole_money};
use unitbook::ledger::{
    AllocationInput, ClientInput, InvoiceInput, PaymentInput, UnitInput, UnitPatch,
};
use unitbook::logging::init_tracing;
use unitbook::pdf;
use unitbook::store::{load_store, save_store, InvoiceStatus, UnitKind, UnitStatus};
use unitbook::{Config, Ledger, Money};

#[derive(Parser)]
#[command(name = "unitbook")]
#[command(version, about = "Back-office ledger for real-estate unit sales", long_about = None)]
struct Cli {
    /// Path to config directory (default: $UNITBOOK_DIR, the platform config dir or ~/.unitbook)
    #[arg(short = 'C', long, global = true)]
    config_dir: Option<PathBuf>,

    /// Log ledger writes to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize config directory with a template config and an empty ledger
    Init,

    /// Show the dashboard: collections, invoice states, due dates, top debtors
    Status,

    /// Re-derive unit totals and invoice coverage
    Recompute {
        /// Only this unit (default: all units)
        #[arg(long)]
        unit: Option<u64>,
    },

    /// Show the active settings
    Settings,

    /// Manage clients
    #[command(subcommand)]
    Client(ClientCommand),

    /// Manage blocks
    #[command(subcommand)]
    Block(BlockCommand),

    /// Manage units
    #[command(subcommand)]
    Unit(UnitCommand),

    /// Manage payments
    #[command(subcommand)]
    Payment(PaymentCommand),

    /// Manage invoices
    #[command(subcommand)]
    Invoice(InvoiceCommand),

    /// Pin parts of payments to specific invoices
    #[command(subcommand)]
    Allocation(AllocationCommand),

    /// Generate a PDF statement of a client's invoices
    Statement {
        #[arg(long)]
        client: u64,

        /// Custom output file path (default: output_dir/statement-<id>-<date>.pdf)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Export records as CSV
    Export {
        #[command(subcommand)]
        what: ExportCommand,

        /// Write to this file instead of stdout
        #[arg(short, long, global = true)]
        output: Option<PathBuf>,
    },
}

#[derive(Args)]
struct ClientFields {
    /// Full name
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    residence: Option<String>,
    #[arg(long)]
    phone: Option<String>,
    #[arg(long)]
    email: Option<String>,
}

#[derive(Subcommand)]
enum ClientCommand {
    /// Add a client
    Add {
        /// Full name
        name: String,
        #[arg(long)]
        residence: Option<String>,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long)]
        email: Option<String>,
    },
    /// Edit a client; omitted fields are kept
    Edit {
        id: u64,
        #[command(flatten)]
        fields: ClientFields,
    },
    /// Remove a client without units, invoices or payments
    Remove { id: u64 },
    /// List clients
    List {
        /// Match name or phone
        #[arg(short, long)]
        query: Option<String>,
    },
    /// Show a client with their units, payments and invoices
    Show { id: u64 },
}

#[derive(Subcommand)]
enum BlockCommand {
    /// Register a block
    Add { name: String },
    /// Remove a block no unit uses
    Remove { name: String },
    /// List blocks with their totals
    List,
}

#[derive(Args)]
struct UnitFields {
    #[arg(long)]
    block: Option<String>,
    /// apartment or local
    #[arg(long, value_parser = parse_kind)]
    kind: Option<UnitKind>,
    #[arg(long)]
    list_number: Option<u32>,
    #[arg(long, allow_hyphen_values = true)]
    floor: Option<i32>,
    #[arg(long)]
    apartment: Option<String>,
    /// Area in m²
    #[arg(long)]
    area: Option<f64>,
    #[arg(long)]
    price_per_m2: Option<Money>,
    #[arg(long)]
    total_price: Option<Money>,
    /// Sale date (YYYY-MM-DD)
    #[arg(long)]
    sale_date: Option<NaiveDate>,
    #[arg(long)]
    contract: Option<String>,
    #[arg(long)]
    comments: Option<String>,
    /// Owning client id
    #[arg(long)]
    client: Option<u64>,
}

#[derive(Subcommand)]
enum UnitCommand {
    /// Add a unit
    Add {
        #[command(flatten)]
        fields: UnitFields,
    },
    /// Edit a unit; omitted fields are kept
    Edit {
        id: u64,
        #[command(flatten)]
        fields: UnitFields,
    },
    /// Remove a unit without payments or invoices
    Remove { id: u64 },
    /// List units
    List {
        #[arg(long)]
        block: Option<String>,
        /// paid, partial or unsold
        #[arg(long, value_parser = parse_unit_status)]
        status: Option<UnitStatus>,
        #[arg(long)]
        client: Option<u64>,
    },
    /// Show a unit with its payments and invoice coverage
    Show { id: u64 },
}

#[derive(Subcommand)]
enum PaymentCommand {
    /// Record a payment on a unit
    Add {
        #[arg(long)]
        unit: u64,
        #[arg(long, allow_hyphen_values = true)]
        amount: Money,
        /// Paying client (default: the unit's owner)
        #[arg(long)]
        client: Option<u64>,
        #[arg(long)]
        label: Option<String>,
        /// Payment date (YYYY-MM-DD)
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Edit a payment; omitted fields are kept
    Edit {
        id: u64,
        #[arg(long)]
        unit: Option<u64>,
        #[arg(long, allow_hyphen_values = true)]
        amount: Option<Money>,
        #[arg(long)]
        client: Option<u64>,
        #[arg(long)]
        label: Option<String>,
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Remove a payment and its pinned allocations
    Remove { id: u64 },
    /// List payments
    List {
        #[arg(long)]
        unit: Option<u64>,
        #[arg(long)]
        client: Option<u64>,
        #[arg(long)]
        from: Option<NaiveDate>,
        #[arg(long)]
        to: Option<NaiveDate>,
    },
}

#[derive(Subcommand)]
enum InvoiceCommand {
    /// Create an invoice for a unit
    Add {
        #[arg(long)]
        unit: u64,
        #[arg(long, allow_hyphen_values = true)]
        subtotal: Money,
        /// Invoice number (default: next number from the configured template)
        #[arg(long)]
        number: Option<String>,
        /// Billed client (default: the unit's owner)
        #[arg(long)]
        client: Option<u64>,
        /// Issue date (default: today)
        #[arg(long)]
        issue_date: Option<NaiveDate>,
        /// Due date (default: issue date plus due_days)
        #[arg(long)]
        due_date: Option<NaiveDate>,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Edit an invoice; omitted fields are kept
    Edit {
        /// Invoice number or id
        invoice: String,
        #[arg(long)]
        unit: Option<u64>,
        #[arg(long, allow_hyphen_values = true)]
        subtotal: Option<Money>,
        #[arg(long)]
        number: Option<String>,
        #[arg(long)]
        client: Option<u64>,
        #[arg(long)]
        issue_date: Option<NaiveDate>,
        #[arg(long)]
        due_date: Option<NaiveDate>,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Remove an invoice and the allocations pinned to it
    Remove {
        /// Invoice number or id
        invoice: String,
    },
    /// List invoices
    List {
        #[command(flatten)]
        filter: InvoiceFilterArgs,
    },
    /// Show an invoice with its coverage
    Show {
        /// Invoice number or id
        invoice: String,
    },
    /// Render an invoice PDF
    Pdf {
        /// Invoice number or id
        invoice: String,
        /// Custom output file path (default: output_dir/invoice-<number>.pdf)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Args)]
struct InvoiceFilterArgs {
    #[arg(long)]
    client: Option<u64>,
    #[arg(long)]
    unit: Option<u64>,
    /// paid, partial or unpaid
    #[arg(long, value_parser = parse_invoice_status)]
    status: Option<InvoiceStatus>,
    /// Issued on or after (YYYY-MM-DD)
    #[arg(long)]
    from: Option<NaiveDate>,
    /// Issued before (YYYY-MM-DD)
    #[arg(long)]
    to: Option<NaiveDate>,
    /// overdue or next30
    #[arg(long, value_parser = parse_due)]
    due: Option<DueWindow>,
}

impl InvoiceFilterArgs {
    fn into_filter(self) -> InvoiceFilter {
        InvoiceFilter {
            client_id: self.client,
            unit_id: self.unit,
            status: self.status,
            issued_from: self.from,
            issued_to: self.to,
            due: self.due,
        }
    }
}

#[derive(Subcommand)]
enum AllocationCommand {
    /// Pin an amount of a payment to an invoice (replaces an existing pin for the pair)
    Add {
        #[arg(long)]
        payment: u64,
        /// Invoice number or id
        #[arg(long)]
        invoice: String,
        #[arg(long)]
        amount: Money,
    },
    /// Remove a pinned allocation
    Remove { id: u64 },
    /// List pinned allocations
    List {
        #[arg(long)]
        unit: Option<u64>,
        #[arg(long)]
        payment: Option<u64>,
    },
}

#[derive(Subcommand)]
enum ExportCommand {
    /// Invoices, optionally filtered
    Invoices {
        #[command(flatten)]
        filter: InvoiceFilterArgs,
    },
    /// Open invoices past their due date
    Overdue,
    /// Open invoices due within 30 days
    Next30,
    /// Payments, optionally filtered
    Payments {
        #[arg(long)]
        unit: Option<u64>,
        #[arg(long)]
        client: Option<u64>,
        #[arg(long)]
        from: Option<NaiveDate>,
        #[arg(long)]
        to: Option<NaiveDate>,
    },
    /// Units, optionally filtered
    Units {
        #[arg(long)]
        block: Option<String>,
        #[arg(long, allow_hyphen_values = true)]
        floor: Option<i32>,
        #[arg(long, value_parser = parse_unit_status)]
        status: Option<UnitStatus>,
        #[arg(long)]
        client: Option<u64>,
    },
    /// Clients with totals over their units
    Clients {
        #[arg(short, long)]
        query: Option<String>,
    },
    /// Clients by remaining debt
    TopClients,
}

fn parse_kind(s: &str) -> std::result::Result<UnitKind, String> {
    match s.to_ascii_lowercase().as_str() {
        "apartment" | "apt" => Ok(UnitKind::Apartment),
        "local" => Ok(UnitKind::Local),
        _ => Err(format!("unknown unit kind '{s}' (use apartment or local)")),
    }
}

fn parse_unit_status(s: &str) -> std::result::Result<UnitStatus, String> {
    UnitStatus::parse(s).ok_or_else(|| format!("unknown status '{s}' (use paid, partial or unsold)"))
}

fn parse_invoice_status(s: &str) -> std::result::Result<InvoiceStatus, String> {
    InvoiceStatus::parse(s)
        .ok_or_else(|| format!("unknown status '{s}' (use paid, partial or unpaid)"))
}

fn parse_due(s: &str) -> std::result::Result<DueWindow, String> {
    match s.to_ascii_lowercase().as_str() {
        "overdue" => Ok(DueWindow::Overdue),
        "next30" => Ok(DueWindow::Next30),
        _ => Err(format!("unknown due window '{s}' (use overdue or next30)")),
    }
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let cfg_dir = match cli.config_dir {
        Some(p) => p,
        None => config::config_dir()?,
    };

    match cli.command {
        Commands::Init => cmd_init(&cfg_dir),
        Commands::Status => cmd_status(&cfg_dir),
        Commands::Recompute { unit } => cmd_recompute(&cfg_dir, unit),
        Commands::Settings => cmd_settings(&cfg_dir),
        Commands::Client(cmd) => cmd_client(&cfg_dir, cmd),
        Commands::Block(cmd) => cmd_block(&cfg_dir, cmd),
        Commands::Unit(cmd) => cmd_unit(&cfg_dir, cmd),
        Commands::Payment(cmd) => cmd_payment(&cfg_dir, cmd),
        Commands::Invoice(cmd) => cmd_invoice(&cfg_dir, cmd),
        Commands::Allocation(cmd) => cmd_allocation(&cfg_dir, cmd),
        Commands::Statement { client, output } => cmd_statement(&cfg_dir, client, output),
        Commands::Export { what, output } => cmd_export(&cfg_dir, what, output),
    }
}

fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

/// Config plus ledger for one command. Mutating commands call `save` once
/// after the operation succeeded.
struct Workspace {
    dir: PathBuf,
    config: Config,
    ledger: Ledger,
}

impl Workspace {
    fn open(cfg_dir: &Path) -> Result<Self> {
        let config = load_config(cfg_dir)?;
        let store = load_store(&store_path(cfg_dir))?;
        let ledger = Ledger::with_settings(store, &config.invoice);
        Ok(Self {
            dir: cfg_dir.to_path_buf(),
            config,
            ledger,
        })
    }

    fn save(&self) -> Result<()> {
        save_store(&store_path(&self.dir), &self.ledger.store)
    }

    fn money(&self, value: Money) -> String {
        format_money(value, &self.config.invoice.currency_symbol)
    }

    fn whole(&self, value: Money) -> String {
        format_whole_money(value, &self.config.invoice.currency_symbol)
    }

    fn date(&self, date: NaiveDate) -> String {
        format_date(date, &self.config.invoice.date_format)
    }

    fn opt_date(&self, date: Option<NaiveDate>) -> String {
        format_opt_date(date, &self.config.invoice.date_format)
    }

    fn client_name(&self, id: u64) -> String {
        self.ledger
            .store
            .client(id)
            .map(|c| c.full_name.clone())
            .unwrap_or_else(|| format!("#{id}"))
    }

    fn unit_label(&self, id: u64) -> String {
        self.ledger
            .store
            .unit(id)
            .map(|u| u.label())
            .unwrap_or_else(|| format!("#{id}"))
    }

    fn output_path(&self, custom: Option<PathBuf>, file_name: String) -> PathBuf {
        custom.unwrap_or_else(|| {
            resolve_output_dir(&self.config.pdf.output_dir, &self.dir).join(file_name)
        })
    }
}

fn print_table<T: Tabled>(rows: Vec<T>) {
    let table = Table::new(rows).with(Style::rounded()).to_string();
    println!("{table}");
}

fn or_dash(value: Option<&str>) -> String {
    value.unwrap_or("-").to_string()
}

/// Initialize config directory
fn cmd_init(cfg_dir: &Path) -> Result<()> {
    init_config_dir(cfg_dir)?;

    println!("Initialized unitbook at: {}", cfg_dir.display());
    println!();
    println!("Next steps:");
    println!(
        "  1. Edit your company details:  $EDITOR {}/{}",
        cfg_dir.display(),
        config::CONFIG_FILE
    );
    println!("  2. Add a client:               unitbook client add \"Full Name\"");
    println!("  3. Add a unit:                 unitbook unit add --block 7A --total-price 71725 --client 1");
    Ok(())
}

fn cmd_status(cfg_dir: &Path) -> Result<()> {
    let ws = Workspace::open(cfg_dir)?;
    let today = today();
    let dash = ws.ledger.dashboard(today);

    println!("Ledger Status");
    println!("{}", "-".repeat(50));
    println!("Config directory: {}", cfg_dir.display());
    println!("Company:          {}", ws.config.company.name);
    println!("Units:            {} ({} sold)", dash.units_total, dash.units_sold);
    println!("Expected:         {}", ws.money(dash.expected));
    println!("Collected:        {}", ws.money(dash.collected));
    println!("Remaining:        {}", ws.money(dash.remaining));
    println!("Collection rate:  {}%", dash.collection_rate);
    println!(
        "Invoices:         {} paid, {} partial, {} unpaid",
        dash.invoices_paid, dash.invoices_partial, dash.invoices_unpaid
    );
    println!(
        "This month:       {} invoiced, {} collected, {} new clients",
        ws.money(dash.invoiced_this_month),
        ws.money(dash.collected_this_month),
        dash.new_clients_this_month
    );
    println!("Next invoice:     {}", ws.ledger.next_invoice_number(today)?);

    if !dash.overdue.is_empty() {
        println!();
        println!(
            "Overdue ({}, {}):",
            dash.overdue.len(),
            ws.money(dash.overdue_total())
        );
        for inv in dash.overdue.iter().take(5) {
            println!(
                "  {} - {} - due {} - {}",
                inv.invoice_number,
                ws.client_name(inv.client_id),
                ws.date(inv.due_date),
                ws.money(inv.remaining_on_invoice)
            );
        }
    }

    if !dash.upcoming.is_empty() {
        println!();
        println!(
            "Due in the next 30 days ({}, {}):",
            dash.upcoming.len(),
            ws.money(dash.upcoming_total())
        );
        for inv in dash.upcoming.iter().take(5) {
            println!(
                "  {} - {} - due {} - {}",
                inv.invoice_number,
                ws.client_name(inv.client_id),
                ws.date(inv.due_date),
                ws.money(inv.remaining_on_invoice)
            );
        }
    }

    if !dash.top_debtors.is_empty() {
        println!();
        println!("Top debtors:");
        for row in &dash.top_debtors {
            println!(
                "  {} ({} units) - {}",
                row.full_name,
                row.units,
                ws.money(row.remaining)
            );
        }
    }
    Ok(())
}

fn cmd_recompute(cfg_dir: &Path, unit: Option<u64>) -> Result<()> {
    let mut ws = Workspace::open(cfg_dir)?;
    let count = match unit {
        Some(id) => {
            if ws.ledger.store.unit(id).is_none() {
                return Err(LedgerError::UnitNotFound(id));
            }
            ws.ledger.recompute(id);
            1
        }
        None => ws.ledger.recompute_all(),
    };
    ws.save()?;
    println!("Recomputed {count} unit(s)");
    Ok(())
}

fn cmd_settings(cfg_dir: &Path) -> Result<()> {
    let ws = Workspace::open(cfg_dir)?;
    let c = &ws.config;

    println!("Settings");
    println!("{}", "-".repeat(50));
    println!("Company:          {}", c.company.name);
    println!("Address:          {}", or_dash(c.company.address.as_deref()));
    println!("City:             {}", or_dash(c.company.city.as_deref()));
    println!("Country:          {}", or_dash(c.company.country.as_deref()));
    println!("Email:            {}", or_dash(c.company.email.as_deref()));
    println!("Phone:            {}", or_dash(c.company.phone.as_deref()));
    println!("Tax ID:           {}", or_dash(c.company.tax_id.as_deref()));
    println!("Number format:    {}", c.invoice.number_format);
    println!(
        "Currency:         {} ({})",
        c.invoice.currency_code, c.invoice.currency_symbol
    );
    println!("Date format:      {}", c.invoice.date_format);
    println!("Payment terms:    {} days", c.invoice.due_days);
    println!(
        "PDF output:       {}",
        resolve_output_dir(&c.pdf.output_dir, cfg_dir).display()
    );
    Ok(())
}

#[derive(Tabled)]
struct ClientRow {
    #[tabled(rename = "ID")]
    id: u64,
    #[tabled(rename = "NAME")]
    name: String,
    #[tabled(rename = "PHONE")]
    phone: String,
    #[tabled(rename = "RESIDENCE")]
    residence: String,
    #[tabled(rename = "UNITS")]
    units: usize,
    #[tabled(rename = "REMAINING")]
    remaining: String,
}

fn cmd_client(cfg_dir: &Path, cmd: ClientCommand) -> Result<()> {
    let mut ws = Workspace::open(cfg_dir)?;

    match cmd {
        ClientCommand::Add {
            name,
            residence,
            phone,
            email,
        } => {
            let input = ClientInput {
                full_name: name,
                residence,
                phone,
                email,
            };
            let id = ws.ledger.create_client(input, today())?;
            ws.save()?;
            println!("Added client #{id}");
        }
        ClientCommand::Edit { id, fields } => {
            let current = ws
                .ledger
                .store
                .client(id)
                .cloned()
                .ok_or(LedgerError::ClientNotFound(id))?;
            let input = ClientInput {
                full_name: fields.name.unwrap_or(current.full_name),
                residence: fields.residence.or(current.residence),
                phone: fields.phone.or(current.phone),
                email: fields.email.or(current.email),
            };
            ws.ledger.update_client(id, input)?;
            ws.save()?;
            println!("Updated client #{id}");
        }
        ClientCommand::Remove { id } => {
            ws.ledger.delete_client(id)?;
            ws.save()?;
            println!("Removed client #{id}");
        }
        ClientCommand::List { query } => {
            let filter = ClientFilter { query };
            let rows: Vec<ClientRow> = ws
                .ledger
                .store
                .clients
                .iter()
                .filter(|c| filter.matches(c))
                .map(|c| {
                    let owned: Vec<_> = ws
                        .ledger
                        .store
                        .units
                        .iter()
                        .filter(|u| u.client_id == Some(c.id))
                        .collect();
                    ClientRow {
                        id: c.id,
                        name: c.full_name.clone(),
                        phone: or_dash(c.phone.as_deref()),
                        residence: or_dash(c.residence.as_deref()),
                        units: owned.len(),
                        remaining: ws.whole(owned.iter().map(|u| u.remaining_debt).sum()),
                    }
                })
                .collect();

            if rows.is_empty() {
                println!("No clients found.");
                return Ok(());
            }
            print_table(rows);
        }
        ClientCommand::Show { id } => {
            let overview = ws.ledger.client_overview(id)?;
            let c = &overview.client;
            println!("Client #{} - {}", c.id, c.full_name);
            println!("{}", "-".repeat(50));
            println!("Residence:  {}", or_dash(c.residence.as_deref()));
            println!("Phone:      {}", or_dash(c.phone.as_deref()));
            println!("Email:      {}", or_dash(c.email.as_deref()));
            println!("Since:      {}", ws.date(c.created_at));
            println!("Units:      {}", overview.units.len());
            println!("Price:      {}", ws.money(overview.total_price));
            println!("Paid:       {}", ws.money(overview.total_paid));
            println!("Remaining:  {}", ws.money(overview.remaining));

            if !overview.units.is_empty() {
                println!();
                print_table(overview.units.iter().map(|u| unit_row(&ws, u)).collect());
            }
            if !overview.invoices.is_empty() {
                println!();
                print_table(
                    overview
                        .invoices
                        .iter()
                        .map(|i| invoice_row(&ws, i))
                        .collect(),
                );
            }
            if !overview.payments.is_empty() {
                println!();
                print_table(
                    overview
                        .payments
                        .iter()
                        .map(|p| payment_row(&ws, p))
                        .collect(),
                );
            }
        }
    }
    Ok(())
}

#[derive(Tabled)]
struct BlockRow {
    #[tabled(rename = "BLOCK")]
    block: String,
    #[tabled(rename = "UNITS")]
    units: usize,
    #[tabled(rename = "PRICE")]
    price: String,
    #[tabled(rename = "PAID")]
    paid: String,
    #[tabled(rename = "REMAINING")]
    remaining: String,
}

fn cmd_block(cfg_dir: &Path, cmd: BlockCommand) -> Result<()> {
    let mut ws = Workspace::open(cfg_dir)?;

    match cmd {
        BlockCommand::Add { name } => {
            ws.ledger.create_block(&name)?;
            ws.save()?;
            println!("Added block {}", name.trim());
        }
        BlockCommand::Remove { name } => {
            ws.ledger.delete_block(&name)?;
            ws.save()?;
            println!("Removed block {}", name.trim());
        }
        BlockCommand::List => {
            let rows: Vec<BlockRow> = ws
                .ledger
                .block_summaries()
                .into_iter()
                .map(|b| BlockRow {
                    block: b.block,
                    units: b.units,
                    price: ws.whole(b.total_price),
                    paid: ws.whole(b.total_paid),
                    remaining: ws.whole(b.remaining),
                })
                .collect();
            if rows.is_empty() {
                println!("No blocks yet.");
                return Ok(());
            }
            print_table(rows);
        }
    }
    Ok(())
}

#[derive(Tabled)]
struct UnitRow {
    #[tabled(rename = "ID")]
    id: u64,
    #[tabled(rename = "UNIT")]
    label: String,
    #[tabled(rename = "KIND")]
    kind: String,
    #[tabled(rename = "FLOOR")]
    floor: String,
    #[tabled(rename = "CLIENT")]
    client: String,
    #[tabled(rename = "PRICE")]
    price: String,
    #[tabled(rename = "PAID")]
    paid: String,
    #[tabled(rename = "REMAINING")]
    remaining: String,
    #[tabled(rename = "PROGRESS")]
    progress: String,
    #[tabled(rename = "STATUS")]
    status: String,
}

fn unit_row(ws: &Workspace, u: &unitbook::store::Unit) -> UnitRow {
    UnitRow {
        id: u.id,
        label: u.label(),
        kind: u.kind.to_string(),
        floor: u.floor.map(|f| f.to_string()).unwrap_or_else(|| "-".into()),
        client: u
            .client_id
            .map(|id| ws.client_name(id))
            .unwrap_or_else(|| "-".into()),
        price: ws.whole(u.total_price),
        paid: ws.whole(u.total_paid),
        remaining: ws.whole(u.remaining_debt),
        progress: format!("{}%", u.payment_progress),
        status: u.status().to_string(),
    }
}

fn unit_input(fields: UnitFields, base: UnitInput) -> UnitInput {
    UnitInput {
        block: fields.block.unwrap_or(base.block),
        kind: fields.kind.unwrap_or(base.kind),
        list_number: fields.list_number.or(base.list_number),
        floor: fields.floor.or(base.floor),
        apartment_number: fields.apartment.or(base.apartment_number),
        area_m2: fields.area.or(base.area_m2),
        price_per_m2: fields.price_per_m2.or(base.price_per_m2),
        total_price: fields.total_price.or(base.total_price),
        sale_date: fields.sale_date.or(base.sale_date),
        contract_info: fields.contract.or(base.contract_info),
        comments: fields.comments.or(base.comments),
        client_id: fields.client.or(base.client_id),
    }
}

impl UnitFields {
    /// True when only pricing or comments are being edited.
    fn is_pricing_only(&self) -> bool {
        self.block.is_none()
            && self.kind.is_none()
            && self.list_number.is_none()
            && self.floor.is_none()
            && self.apartment.is_none()
            && self.area.is_none()
            && self.sale_date.is_none()
            && self.contract.is_none()
            && self.client.is_none()
    }
}

fn cmd_unit(cfg_dir: &Path, cmd: UnitCommand) -> Result<()> {
    let mut ws = Workspace::open(cfg_dir)?;

    match cmd {
        UnitCommand::Add { fields } => {
            let input = unit_input(fields, UnitInput::default());
            let id = ws.ledger.create_unit(input)?;
            ws.save()?;
            println!("Added unit #{id} ({})", ws.unit_label(id));
        }
        UnitCommand::Edit { id, fields } => {
            let current = ws
                .ledger
                .store
                .unit(id)
                .cloned()
                .ok_or(LedgerError::UnitNotFound(id))?;
            if fields.is_pricing_only() {
                let patch = UnitPatch {
                    price_per_m2: fields.price_per_m2,
                    total_price: fields.total_price,
                    comments: fields.comments,
                };
                ws.ledger.update_unit(id, patch)?;
            } else {
                let base = UnitInput {
                    block: current.block,
                    kind: current.kind,
                    list_number: current.list_number,
                    floor: current.floor,
                    apartment_number: current.apartment_number,
                    area_m2: current.area_m2,
                    price_per_m2: current.price_per_m2,
                    total_price: Some(current.total_price),
                    sale_date: current.sale_date,
                    contract_info: current.contract_info,
                    comments: current.comments,
                    client_id: current.client_id,
                };
                ws.ledger.update_unit_full(id, unit_input(fields, base))?;
            }
            ws.save()?;
            println!("Updated unit #{id}");
        }
        UnitCommand::Remove { id } => {
            ws.ledger.delete_unit(id)?;
            ws.save()?;
            println!("Removed unit #{id}");
        }
        UnitCommand::List {
            block,
            status,
            client,
        } => {
            let filter = UnitFilter {
                block,
                floor: None,
                status,
                client_id: client,
            };
            let mut units: Vec<_> = ws
                .ledger
                .store
                .units
                .iter()
                .filter(|u| filter.matches(u))
                .collect();
            units.sort_by(|a, b| {
                (&a.block, a.floor, a.list_number, a.id).cmp(&(&b.block, b.floor, b.list_number, b.id))
            });
            if units.is_empty() {
                println!("No units found.");
                return Ok(());
            }
            print_table(units.iter().map(|u| unit_row(&ws, u)).collect());
        }
        UnitCommand::Show { id } => {
            let unit = ws
                .ledger
                .store
                .unit(id)
                .ok_or(LedgerError::UnitNotFound(id))?;
            println!("Unit #{} - {}", unit.id, unit.label());
            println!("{}", "-".repeat(50));
            println!("Kind:       {}", unit.kind);
            println!(
                "Floor:      {}",
                unit.floor.map(|f| f.to_string()).unwrap_or_else(|| "-".into())
            );
            println!(
                "Area:       {}",
                unit.area_m2.map(|a| format!("{a:.2} m²")).unwrap_or_else(|| "-".into())
            );
            println!(
                "Price/m²:   {}",
                unit.price_per_m2.map(|p| ws.money(p)).unwrap_or_else(|| "-".into())
            );
            println!(
                "Client:     {}",
                unit.client_id.map(|c| ws.client_name(c)).unwrap_or_else(|| "-".into())
            );
            println!("Sale date:  {}", ws.opt_date(unit.sale_date));
            println!("Contract:   {}", or_dash(unit.contract_info.as_deref()));
            println!("Price:      {}", ws.money(unit.total_price));
            println!("Paid:       {}", ws.money(unit.total_paid));
            println!("Remaining:  {}", ws.money(unit.remaining_debt));
            println!("Progress:   {}% ({})", unit.payment_progress, unit.status());

            let payments: Vec<PaymentRow> = ws
                .ledger
                .store
                .payment_lines(id)
                .iter()
                .filter_map(|l| ws.ledger.store.payment(l.id))
                .map(|p| payment_row(&ws, p))
                .collect();
            if !payments.is_empty() {
                println!();
                print_table(payments);
            }

            if let Some(allocation) = ws.ledger.allocation_for_unit(id) {
                let rows: Vec<CoverageRow> = allocation
                    .invoices
                    .iter()
                    .filter_map(|c| ws.ledger.store.invoice(c.invoice_id).map(|i| (i, c)))
                    .map(|(i, c)| CoverageRow {
                        number: i.invoice_number.clone(),
                        issued: ws.date(i.issue_date),
                        subtotal: ws.whole(i.subtotal),
                        pinned: ws.whole(c.explicit),
                        in_order: ws.whole(c.fifo),
                        remaining: ws.whole(c.remaining),
                    })
                    .collect();
                if !rows.is_empty() {
                    println!();
                    print_table(rows);
                    println!("Not yet applied to invoices: {}", ws.money(allocation.unallocated));
                }
            }
        }
    }
    Ok(())
}

#[derive(Tabled)]
struct CoverageRow {
    #[tabled(rename = "INVOICE")]
    number: String,
    #[tabled(rename = "ISSUED")]
    issued: String,
    #[tabled(rename = "SUBTOTAL")]
    subtotal: String,
    #[tabled(rename = "PINNED")]
    pinned: String,
    #[tabled(rename = "IN ORDER")]
    in_order: String,
    #[tabled(rename = "REMAINING")]
    remaining: String,
}

#[derive(Tabled)]
struct PaymentRow {
    #[tabled(rename = "ID")]
    id: u64,
    #[tabled(rename = "DATE")]
    date: String,
    #[tabled(rename = "UNIT")]
    unit: String,
    #[tabled(rename = "CLIENT")]
    client: String,
    #[tabled(rename = "LABEL")]
    label: String,
    #[tabled(rename = "AMOUNT")]
    amount: String,
    #[tabled(rename = "PINNED")]
    pinned: String,
}

fn payment_row(ws: &Workspace, p: &unitbook::store::Payment) -> PaymentRow {
    let pinned: Money = ws
        .ledger
        .store
        .allocations_for_payment(p.id)
        .map(|a| a.amount)
        .sum();
    PaymentRow {
        id: p.id,
        date: ws.opt_date(p.date),
        unit: ws.unit_label(p.unit_id),
        client: ws.client_name(p.client_id),
        label: or_dash(p.label.as_deref()),
        amount: ws.whole(p.amount),
        pinned: ws.whole(pinned),
    }
}

fn cmd_payment(cfg_dir: &Path, cmd: PaymentCommand) -> Result<()> {
    let mut ws = Workspace::open(cfg_dir)?;

    match cmd {
        PaymentCommand::Add {
            unit,
            amount,
            client,
            label,
            date,
        } => {
            let id = ws.ledger.add_payment(PaymentInput {
                unit_id: unit,
                client_id: client,
                label,
                date,
                amount,
            })?;
            ws.save()?;
            println!(
                "Recorded payment #{id} of {} on {}",
                ws.money(amount),
                ws.unit_label(unit)
            );
            if let Some(u) = ws.ledger.store.unit(unit) {
                println!(
                    "  Paid: {}  Remaining: {}  ({}%)",
                    ws.money(u.total_paid),
                    ws.money(u.remaining_debt),
                    u.payment_progress
                );
            }
        }
        PaymentCommand::Edit {
            id,
            unit,
            amount,
            client,
            label,
            date,
        } => {
            let current = ws
                .ledger
                .store
                .payment(id)
                .cloned()
                .ok_or(LedgerError::PaymentNotFound(id))?;
            let input = PaymentInput {
                unit_id: unit.unwrap_or(current.unit_id),
                client_id: Some(client.unwrap_or(current.client_id)),
                label: label.or(current.label),
                date: date.or(current.date),
                amount: amount.unwrap_or(current.amount),
            };
            ws.ledger.update_payment(id, input)?;
            ws.save()?;
            println!("Updated payment #{id}");
        }
        PaymentCommand::Remove { id } => {
            ws.ledger.delete_payment(id)?;
            ws.save()?;
            println!("Removed payment #{id}");
        }
        PaymentCommand::List {
            unit,
            client,
            from,
            to,
        } => {
            let filter = PaymentFilter {
                client_id: client,
                unit_id: unit,
                from,
                to,
            };
            let mut payments: Vec<_> = ws
                .ledger
                .store
                .payments
                .iter()
                .filter(|p| filter.matches(p))
                .collect();
            payments.sort_by_key(|p| (p.date, p.id));
            if payments.is_empty() {
                println!("No payments found.");
                return Ok(());
            }
            let total: Money = payments.iter().map(|p| p.amount).sum();
            print_table(payments.iter().map(|p| payment_row(&ws, p)).collect());
            println!();
            println!("Total: {} payments, {}", payments.len(), ws.money(total));
        }
    }
    Ok(())
}

#[derive(Tabled)]
struct InvoiceRow {
    #[tabled(rename = "ID")]
    id: u64,
    #[tabled(rename = "NUMBER")]
    number: String,
    #[tabled(rename = "ISSUED")]
    issued: String,
    #[tabled(rename = "DUE")]
    due: String,
    #[tabled(rename = "UNIT")]
    unit: String,
    #[tabled(rename = "CLIENT")]
    client: String,
    #[tabled(rename = "SUBTOTAL")]
    subtotal: String,
    #[tabled(rename = "PAID")]
    paid: String,
    #[tabled(rename = "REMAINING")]
    remaining: String,
    #[tabled(rename = "STATUS")]
    status: String,
}

fn invoice_row(ws: &Workspace, i: &unitbook::store::Invoice) -> InvoiceRow {
    InvoiceRow {
        id: i.id,
        number: i.invoice_number.clone(),
        issued: ws.date(i.issue_date),
        due: ws.date(i.due_date),
        unit: ws.unit_label(i.unit_id),
        client: ws.client_name(i.client_id),
        subtotal: ws.whole(i.subtotal),
        paid: ws.whole(i.total_paid_on_invoice),
        remaining: ws.whole(i.remaining_on_invoice),
        status: i.status().to_string(),
    }
}

fn cmd_invoice(cfg_dir: &Path, cmd: InvoiceCommand) -> Result<()> {
    let mut ws = Workspace::open(cfg_dir)?;
    let today = today();

    match cmd {
        InvoiceCommand::Add {
            unit,
            subtotal,
            number,
            client,
            issue_date,
            due_date,
            notes,
        } => {
            let input = InvoiceInput {
                invoice_number: number,
                client_id: client,
                unit_id: unit,
                issue_date,
                due_date,
                subtotal,
                notes,
            };
            let id = ws.ledger.create_invoice(input, today)?;
            ws.save()?;
            if let Some(inv) = ws.ledger.store.invoice(id) {
                println!("Created invoice {} (#{id})", inv.invoice_number);
                println!("  Unit:      {}", ws.unit_label(inv.unit_id));
                println!("  Subtotal:  {}", ws.money(inv.subtotal));
                println!("  Due:       {}", ws.date(inv.due_date));
                println!("  Status:    {}", inv.status());
            }
        }
        InvoiceCommand::Edit {
            invoice,
            unit,
            subtotal,
            number,
            client,
            issue_date,
            due_date,
            notes,
        } => {
            let current = ws.ledger.find_invoice(&invoice)?.clone();
            let input = InvoiceInput {
                invoice_number: number,
                client_id: Some(client.unwrap_or(current.client_id)),
                unit_id: unit.unwrap_or(current.unit_id),
                issue_date: Some(issue_date.unwrap_or(current.issue_date)),
                due_date: Some(due_date.unwrap_or(current.due_date)),
                subtotal: subtotal.unwrap_or(current.subtotal),
                notes: notes.or(current.notes),
            };
            ws.ledger.update_invoice(current.id, input, today)?;
            ws.save()?;
            println!("Updated invoice #{}", current.id);
        }
        InvoiceCommand::Remove { invoice } => {
            let inv = ws.ledger.find_invoice(&invoice)?;
            let (id, number) = (inv.id, inv.invoice_number.clone());
            ws.ledger.delete_invoice(id)?;
            ws.save()?;
            println!("Removed invoice {number}");
        }
        InvoiceCommand::List { filter } => {
            let filter = filter.into_filter();
            let mut invoices: Vec<_> = ws
                .ledger
                .store
                .invoices
                .iter()
                .filter(|i| filter.matches(i, today))
                .collect();
            invoices.sort_by_key(|i| (i.issue_date, i.id));
            if invoices.is_empty() {
                println!("No invoices found.");
                return Ok(());
            }

            let subtotal: Money = invoices.iter().map(|i| i.subtotal).sum();
            let paid: Money = invoices.iter().map(|i| i.total_paid_on_invoice).sum();
            let remaining: Money = invoices.iter().map(|i| i.remaining_on_invoice).sum();
            print_table(invoices.iter().map(|i| invoice_row(&ws, i)).collect());
            println!();
            println!(
                "Total: {} invoices, {} invoiced, {} paid, {} remaining",
                invoices.len(),
                ws.money(subtotal),
                ws.money(paid),
                ws.money(remaining)
            );
        }
        InvoiceCommand::Show { invoice } => {
            let inv = ws.ledger.find_invoice(&invoice)?;
            println!("Invoice {} (#{})", inv.invoice_number, inv.id);
            println!("{}", "-".repeat(50));
            println!("Client:     {}", ws.client_name(inv.client_id));
            println!("Unit:       {}", ws.unit_label(inv.unit_id));
            println!("Issued:     {}", ws.date(inv.issue_date));
            println!("Due:        {}", ws.date(inv.due_date));
            println!("Subtotal:   {}", ws.money(inv.subtotal));
            println!("Paid:       {}", ws.money(inv.total_paid_on_invoice));
            println!("Remaining:  {}", ws.money(inv.remaining_on_invoice));
            println!("Status:     {}", inv.status());
            if inv.is_overdue(today) {
                println!("            OVERDUE");
            }
            if let Some(c) = ws
                .ledger
                .allocation_for_unit(inv.unit_id)
                .and_then(|a| a.coverage_for(inv.id).cloned())
            {
                println!("  pinned:   {}", ws.money(c.explicit));
                println!("  in order: {}", ws.money(c.fifo));
            }
            if let Some(notes) = &inv.notes {
                println!("Notes:      {notes}");
            }
        }
        InvoiceCommand::Pdf { invoice, output } => {
            let inv = ws.ledger.find_invoice(&invoice)?;
            let (id, number) = (inv.id, inv.invoice_number.clone());
            let doc = pdf::invoice_document(&ws.ledger, &ws.config, id)?;
            let path = ws.output_path(output, pdf::invoice_file_name(&number));
            pdf::render_invoice(&doc, &path)?;
            println!("Generated invoice {number}");
            println!("  Saved: {}", path.display());
        }
    }
    Ok(())
}

#[derive(Tabled)]
struct AllocationRow {
    #[tabled(rename = "ID")]
    id: u64,
    #[tabled(rename = "PAYMENT")]
    payment: String,
    #[tabled(rename = "INVOICE")]
    invoice: String,
    #[tabled(rename = "UNIT")]
    unit: String,
    #[tabled(rename = "AMOUNT")]
    amount: String,
}

fn cmd_allocation(cfg_dir: &Path, cmd: AllocationCommand) -> Result<()> {
    let mut ws = Workspace::open(cfg_dir)?;

    match cmd {
        AllocationCommand::Add {
            payment,
            invoice,
            amount,
        } => {
            let invoice_id = ws.ledger.find_invoice(&invoice)?.id;
            let id = ws.ledger.add_allocation(AllocationInput {
                payment_id: payment,
                invoice_id,
                amount,
            })?;
            ws.save()?;
            let left = ws.ledger.available_for(payment, None)?;
            println!(
                "Pinned {} of payment #{payment} to invoice {invoice} (allocation #{id})",
                ws.money(amount)
            );
            println!("  Still available on payment: {}", ws.money(left));
        }
        AllocationCommand::Remove { id } => {
            ws.ledger.delete_allocation(id)?;
            ws.save()?;
            println!("Removed allocation #{id}");
        }
        AllocationCommand::List { unit, payment } => {
            let store = &ws.ledger.store;
            let allocations: Vec<_> = match unit {
                Some(unit_id) => store.allocations_for_unit(unit_id),
                None => store.allocations.iter().collect(),
            };
            let rows: Vec<AllocationRow> = allocations
                .into_iter()
                .filter(|a| payment.map_or(true, |p| a.payment_id == p))
                .map(|a| AllocationRow {
                    id: a.id,
                    payment: format!("#{}", a.payment_id),
                    invoice: store
                        .invoice(a.invoice_id)
                        .map(|i| i.invoice_number.clone())
                        .unwrap_or_else(|| format!("#{}", a.invoice_id)),
                    unit: store
                        .payment(a.payment_id)
                        .map(|p| ws.unit_label(p.unit_id))
                        .unwrap_or_else(|| "-".into()),
                    amount: ws.whole(a.amount),
                })
                .collect();
            if rows.is_empty() {
                println!("No allocations found.");
                return Ok(());
            }
            print_table(rows);
        }
    }
    Ok(())
}

fn cmd_statement(cfg_dir: &Path, client: u64, output: Option<PathBuf>) -> Result<()> {
    let ws = Workspace::open(cfg_dir)?;
    let today = today();
    let doc = pdf::statement_document(&ws.ledger, &ws.config, client, today)?;
    let path = ws.output_path(output, pdf::statement_file_name(client, today));
    pdf::render_statement(&doc, &path)?;

    println!("Generated statement for {}", ws.client_name(client));
    println!("  Invoices: {}", doc.rows.len());
    println!("  Remaining: {}", doc.remaining);
    println!("  Saved:    {}", path.display());
    Ok(())
}

fn cmd_export(cfg_dir: &Path, what: ExportCommand, output: Option<PathBuf>) -> Result<()> {
    let ws = Workspace::open(cfg_dir)?;
    let out: Box<dyn Write> = match &output {
        Some(path) => Box::new(File::create(path)?),
        None => Box::new(io::stdout().lock()),
    };
    let ledger = &ws.ledger;
    let today = today();

    let rows = match what {
        ExportCommand::Invoices { filter } => {
            export::write_invoices(out, ledger, &filter.into_filter(), today)?
        }
        ExportCommand::Overdue => export::write_invoices(out, ledger, &InvoiceFilter::overdue(), today)?,
        ExportCommand::Next30 => export::write_invoices(out, ledger, &InvoiceFilter::next30(), today)?,
        ExportCommand::Payments {
            unit,
            client,
            from,
            to,
        } => export::write_payments(
            out,
            ledger,
            &PaymentFilter {
                client_id: client,
                unit_id: unit,
                from,
                to,
            },
        )?,
        ExportCommand::Units {
            block,
            floor,
            status,
            client,
        } => export::write_units(
            out,
            ledger,
            &UnitFilter {
                block,
                floor,
                status,
                client_id: client,
            },
        )?,
        ExportCommand::Clients { query } => {
            export::write_clients(out, ledger, &ClientFilter { query })?
        }
        ExportCommand::TopClients => export::write_top_clients(out, ledger)?,
    };

    if let Some(path) = output {
        println!("Exported {rows} rows to {}", path.display());
    }
    Ok(())
}
