//! Markdown and JSON report generation.
//!
//! This module renders the computed report tables. Column headers keep
//! the names the warehouse team reads in the spreadsheets.

use crate::models::{
    BucketDistribution, CodesPage, GroupedPage, GroupedPallets, HourActivity, Report,
    ReportMetadata, SkuPalletStats, SkuQuantity, StoragePage, StorageRow, StorageTable,
    SummaryMetrics, GROUPED_TOTAL_LABEL,
};
use anyhow::Result;

/// Generate a complete Markdown report.
pub fn generate_markdown_report(report: &Report) -> String {
    let mut output = String::new();

    output.push_str("# Plano de Contingência Logística - Análise RFID\n\n");

    output.push_str(&generate_metadata_section(&report.metadata));
    output.push_str(&generate_summary_section(&report.summary));

    if let Some(ref codes) = report.codes {
        output.push_str(&generate_codes_section(codes));
    }
    if let Some(ref grouped) = report.grouped {
        output.push_str(&generate_grouped_section(grouped));
    }
    if let Some(ref storage) = report.storage {
        output.push_str(&generate_storage_section(storage));
    }

    output.push_str(&generate_footer());

    output
}

/// Generate a JSON report.
pub fn generate_json_report(report: &Report) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}

/// Format a quantity, dropping the fraction for whole numbers.
pub fn format_quantity(value: f64) -> String {
    let rounded = crate::analysis::round_to(value, 2);
    if rounded.fract() == 0.0 {
        format!("{:.0}", rounded)
    } else {
        format!("{}", rounded)
    }
}

/// Format a unit count: whole part only, `.` thousands separator.
pub fn format_units(value: f64) -> String {
    format_thousands(value.trunc() as i64)
}

/// Format a whole number with `.` as the thousands separator.
pub fn format_thousands(value: i64) -> String {
    let digits = value.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }
    if value < 0 {
        format!("-{}", grouped)
    } else {
        grouped
    }
}

fn escape_cell(value: &str) -> String {
    value.replace('|', "\\|")
}

/// Render a Markdown table.
fn markdown_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let mut table = String::new();

    table.push_str(&format!(
        "| {} |\n",
        headers.iter().map(|h| escape_cell(h)).collect::<Vec<_>>().join(" | ")
    ));
    table.push_str(&format!("|{}\n", ":---|".repeat(headers.len())));
    for row in rows {
        table.push_str(&format!(
            "| {} |\n",
            row.iter().map(|c| escape_cell(c)).collect::<Vec<_>>().join(" | ")
        ));
    }
    table.push('\n');

    table
}

fn headers(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}

/// Generate the metadata section.
fn generate_metadata_section(metadata: &ReportMetadata) -> String {
    let mut section = String::new();

    section.push_str("## Metadados\n\n");
    section.push_str(&format!(
        "- **Movimento:** `{}` ({} linhas)\n",
        metadata.movement_path, metadata.movement_rows
    ));
    section.push_str(&format!(
        "- **Recebimento:** `{}` ({} linhas)\n",
        metadata.receiving_path, metadata.receiving_rows
    ));
    section.push_str(&format!("- **Codificação:** {}\n", metadata.encoding));
    section.push_str(&format!(
        "- **Gerado em:** {}\n",
        metadata.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));

    match (&metadata.rfid_column_movement, &metadata.rfid_column_receiving) {
        (Some(movement), Some(receiving)) => section.push_str(&format!(
            "- **Colunas RFID:** Movimento: `{}`, Recebimento: `{}`\n",
            movement, receiving
        )),
        _ => section.push_str(
            "- **Colunas RFID:** não encontradas; análise baseada em coordenadas (x, y, z) e ground_position_alias\n",
        ),
    }

    for filter in &metadata.filters {
        section.push_str(&format!("- **Filtro:** {}\n", filter));
    }
    section.push_str(&format!(
        "- **Duração:** {:.2}s\n",
        metadata.duration_seconds
    ));
    section.push('\n');

    section
}

/// Generate the summary metrics section.
fn generate_summary_section(summary: &SummaryMetrics) -> String {
    let mut section = String::new();

    section.push_str("## Resumo\n\n");
    section.push_str(&markdown_table(
        &headers(&[
            "Total de Produtos",
            "Total de Pallets",
            "Total de Unidades",
            "Média por Pallet",
        ]),
        &[vec![
            summary.products.to_string(),
            summary.pallets.to_string(),
            format_units(summary.units),
            format!("{:.2}", summary.mean_per_pallet),
        ]],
    ));

    section
}

/// Generate the codes and quantities page.
fn generate_codes_section(page: &CodesPage) -> String {
    let mut section = String::new();

    section.push_str("## Códigos e Quantidades Recebidas\n\n");
    section.push_str(&quantities_table(&page.quantities));

    section.push_str("## Estatísticas de Pallets por Produto\n\n");
    section.push_str(&pallet_stats_table(&page.pallet_stats));

    if !page.top_products.is_empty() {
        section.push_str("### Principais Produtos por Média por Pallet\n\n");
        let rows: Vec<Vec<String>> = page
            .top_products
            .iter()
            .map(|s| vec![s.sku.clone(), format!("{:.2}", s.mean)])
            .collect();
        section.push_str(&markdown_table(
            &headers(&["Código do Item", "Média por Pallet"]),
            &rows,
        ));
    }

    if !page.outliers.is_empty() {
        section.push_str("### Detecção de Outliers

");
        let rows: Vec<Vec<String>> = page
            .outliers
            .iter()
            .map(|o| vec![o.sku.clone(), format!("{:.2}", o.variation)])
            .collect();
        section.push_str(&markdown_table(
            &headers(&["Código do Item", "Variação Máx/Mín"]),
            &rows,
        ));
    }

    section
}

fn quantities_table(quantities: &[SkuQuantity]) -> String {
    let rows: Vec<Vec<String>> = quantities
        .iter()
        .map(|q| vec![q.sku.clone(), format_quantity(q.quantity)])
        .collect();
    markdown_table(&headers(&["Código do Item", "Qtd no Quantum"]), &rows)
}

fn pallet_stats_table(stats: &[SkuPalletStats]) -> String {
    let rows: Vec<Vec<String>> = stats
        .iter()
        .map(|s| {
            vec![
                s.sku.clone(),
                s.pallets.to_string(),
                format!("{:.2}", s.mean),
                format_quantity(s.min),
                format_quantity(s.max),
            ]
        })
        .collect();
    markdown_table(
        &headers(&[
            "Código do Item",
            "Total de Pallets",
            "Média por Pallet",
            "Mínimo por Pallet",
            "Máximo por Pallet",
        ]),
        &rows,
    )
}

/// Generate the grouped pallets page.
fn generate_grouped_section(page: &GroupedPage) -> String {
    let mut section = String::new();

    section.push_str("## Pallets Agrupados ao Longo do Dia\n\n");
    section.push_str(&grouped_table(&page.table));

    if let Some(ref activity) = page.activity {
        section.push_str("### Atividade ao Longo do Dia\n\n");
        section.push_str(&activity_table(activity));
    }

    section
}

fn grouped_table(grouped: &GroupedPallets) -> String {
    let mut columns = headers(&["HH:MM", "Local"]);
    columns.extend(grouped.users.iter().cloned());

    let mut rows: Vec<Vec<String>> = grouped
        .rows
        .iter()
        .map(|row| {
            let mut cells = vec![row.hour.clone(), row.location.clone()];
            cells.extend(row.counts.iter().map(u64::to_string));
            cells
        })
        .collect();

    let mut total = vec![GROUPED_TOTAL_LABEL.to_string(), String::new()];
    total.extend(grouped.totals.iter().map(u64::to_string));
    rows.push(total);

    markdown_table(&columns, &rows)
}

fn activity_table(activity: &[HourActivity]) -> String {
    let rows: Vec<Vec<String>> = activity
        .iter()
        .map(|a| vec![a.hour.clone(), a.pallets.to_string()])
        .collect();
    markdown_table(&headers(&["Horário", "Total de Pallets"]), &rows)
}

/// Generate the storage page.
fn generate_storage_section(page: &StoragePage) -> String {
    let mut section = String::new();

    section.push_str("## Armazenado\n\n");

    if let Some((column, message)) = page.outcome.message() {
        section.push_str(&markdown_table(&[column.to_string()], &[vec![message.to_string()]]));
        return section;
    }

    let Some(report) = page.outcome.report() else {
        return section;
    };

    section.push_str(&format!("*Método de Junção: {}*\n\n", report.join_method));
    section.push_str(&storage_table(&report.table));

    if let Some(ref trace) = report.traceability {
        section.push_str("### Rastreabilidade\n\n");
        let mut columns = headers(&[
            "Método de Junção",
            "Pallets Rastreados por RFID",
            "Total de Pallets",
            "% Rastreados por RFID",
        ]);
        let mut row = vec![
            trace.method.clone(),
            trace.tracked.to_string(),
            trace.total.to_string(),
            trace.tracked_pct.clone(),
        ];
        if let Some(ref period) = report.period {
            columns.push("Período Filtrado".to_string());
            row.push(period.clone());
        }
        section.push_str(&markdown_table(&columns, &[row]));
    } else if let Some(ref period) = report.period {
        section.push_str("### Período\n\n");
        section.push_str(&markdown_table(
            &headers(&["Período Filtrado"]),
            &[vec![period.clone()]],
        ));
    }

    if !page.distribution.is_empty() {
        section.push_str("### Distribuição por Faixa de Horário\n\n");
        section.push_str(&distribution_table(&page.distribution));
    }

    section
}

fn storage_row_cells(row: &StorageRow) -> Vec<String> {
    let mut cells = vec![
        row.bucket.clone(),
        format_quantity(row.checked),
        format_quantity(row.untracked),
        row.untracked_pct.clone(),
    ];
    cells.extend(row.per_street.iter().map(|q| format_quantity(*q)));
    cells
}

fn storage_table(table: &StorageTable) -> String {
    let mut columns = headers(&[
        "Faixa de Horário Recebido",
        "Qtd Pallet Conferido",
        "Não Rastreado",
        "% Não Rastreado",
    ]);
    columns.extend(table.streets.iter().cloned());

    let mut rows: Vec<Vec<String>> = table.rows.iter().map(storage_row_cells).collect();
    rows.push(storage_row_cells(&table.total));

    markdown_table(&columns, &rows)
}

fn distribution_table(distribution: &[BucketDistribution]) -> String {
    let rows: Vec<Vec<String>> = distribution
        .iter()
        .map(|d| {
            vec![
                d.bucket.clone(),
                format_quantity(d.checked),
                format_quantity(d.untracked),
                d.untracked_pct.clone(),
            ]
        })
        .collect();
    markdown_table(
        &headers(&[
            "Faixa de Horário Recebido",
            "Qtd Pallet Conferido",
            "Não Rastreado",
            "% Não Rastreado",
        ]),
        &rows,
    )
}

/// Generate the report footer.
fn generate_footer() -> String {
    format!("---\n\n*Relatório gerado por rfidreport v{}*\n", env!("CARGO_PKG_VERSION"))
}
