mod common;

use common::{fine_row, fines_table};
use simit_check::config::Detection;
use simit_check::extract::{EXTRACT_FAILED, NO_DETAILS, extract_details};

#[test]
fn extracts_one_block_per_fine_row() {
    let mut short = fine_row();
    short.truncate(6);
    let html = fines_table(&[fine_row(), vec!["No se encontraron multas"], short]);

    let details = extract_details(&Detection::default(), &html);

    assert!(details.starts_with("=== FINE 1 ===\nType: Comparendo\n"));
    assert!(details.contains("Authority: Bogotá D.C.\n"));
    assert!(details.contains("Amount due: $ 468.500"));
    assert!(details.contains("=== FINE 2 ==="));
    assert!(!details.contains("=== FINE 3 ==="));

    let second = details.split("=== FINE 2 ===").nth(1).unwrap();
    assert!(second.contains("Status: Pendiente"));
    assert!(!second.contains("Value:"));
    assert!(!details.ends_with('\n'));
}

#[test]
fn cell_whitespace_is_collapsed() {
    let mut row = fine_row();
    row[0] = "  Comparendo\n   electrónico ";
    let details = extract_details(&Detection::default(), &fines_table(&[row]));
    assert!(details.contains("Type: Comparendo electrónico\n"));
}

#[test]
fn table_without_data_rows_has_no_details() {
    let html = fines_table(&[vec!["Sin multas"]]);
    assert_eq!(extract_details(&Detection::default(), &html), NO_DETAILS);
}

#[test]
fn missing_table_cannot_be_extracted() {
    let html = "<html><body><p>Valor a pagar</p></body></html>";
    assert_eq!(extract_details(&Detection::default(), html), EXTRACT_FAILED);
}
