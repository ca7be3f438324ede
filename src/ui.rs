//! Saída de terminal do job: resumo colorido da execução.
//!
//! Usa a crate `console` para estilização com cores, no mesmo espírito do
//! registro de auditoria impresso ao final de cada execução.

use console::Style;

use crate::job::RunSummary;

/// Imprime o resumo da execução: contagens em destaque e o JSON completo.
///
/// Atualizações aparecem em verde; falhas de consulta, em amarelo quando
/// houver alguma.
pub fn print_summary(summary: &RunSummary) {
    let green = Style::new().green().bold();
    let yellow = Style::new().yellow();
    let dim = Style::new().dim();

    println!(
        "  {} {} record(s) updated ({})",
        green.apply_to("✓"),
        summary.updated(),
        summary.variant
    );
    let skipped = summary.no_event + summary.lookup_failed + summary.invalid;
    if skipped > 0 {
        println!(
            "  {} {skipped} record(s) skipped: {} without event, {} lookup failure(s), {} invalid",
            yellow.apply_to("↷"),
            summary.no_event,
            summary.lookup_failed,
            summary.invalid
        );
    }
    println!("  {} watermark now {}", dim.apply_to("→"), summary.watermark);

    println!();
    println!("{}", dim.apply_to("─── Run Summary ───"));
    println!(
        "{}",
        serde_json::to_string_pretty(summary).unwrap_or_default()
    );
}
