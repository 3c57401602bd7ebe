//! Scraper for the server-rendered waste calendar.
//!
//! Rows look like `<tr class="waste-calendar__item"><td>02.11</td><td><img
//! title="Restavfall"> ...</td></tr>`. The day cells omit the year, which comes
//! from the year picker above the table.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use henteplan_core::model::{ProviderId, RawPickup};
use henteplan_core::ports::PortError;

const UNKNOWN_FRACTION: &str = "Ukjent";

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("valid calendar selector")
}

static CALENDAR: LazyLock<Selector> = LazyLock::new(|| selector(r#"[class*="waste-calendar"]"#));
static PICKER: LazyLock<Selector> = LazyLock::new(|| selector("select"));
static OPTION: LazyLock<Selector> = LazyLock::new(|| selector("option"));
static SELECTED_OPTION: LazyLock<Selector> = LazyLock::new(|| selector("option[selected]"));
static ROW: LazyLock<Selector> = LazyLock::new(|| selector("tr.waste-calendar__item"));
static IMG: LazyLock<Selector> = LazyLock::new(|| selector("img"));

static YEAR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d{4})").expect("valid year pattern"));
static DAY_MONTH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{1,2})\.(\d{1,2})").expect("valid day pattern"));
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace pattern"));

/// Extract one pickup per fraction image per calendar row.
///
/// `fallback_year` is used when the page has no year picker. Rows whose first
/// cell carries no `dd.mm` date, or whose date does not exist, are skipped.
/// Attribute values and text arrive with entities already decoded.
///
/// # Errors
///
/// Returns [`PortError::Malformed`] when the document has no calendar markup.
pub fn parse_calendar_html(
    provider: &ProviderId,
    html: &str,
    fallback_year: i32,
) -> Result<Vec<RawPickup>, PortError> {
    let document = Html::parse_document(html);
    if document.select(&CALENDAR).next().is_none() {
        return Err(PortError::malformed(provider, "no waste calendar in page"));
    }

    let year = selected_year(&document).unwrap_or(fallback_year);
    let mut pickups = Vec::new();
    for row in document.select(&ROW) {
        let mut cells = row
            .children()
            .filter_map(ElementRef::wrap)
            .filter(|cell| cell.value().name() == "td");
        let (Some(date_cell), Some(fraction_cell)) = (cells.next(), cells.next()) else {
            continue;
        };
        let Some(date) = row_date(date_cell, year) else {
            continue;
        };

        for img in fraction_cell.select(&IMG) {
            let fraction = img
                .value()
                .attr("title")
                .map(str::trim)
                .filter(|title| !title.is_empty())
                .unwrap_or(UNKNOWN_FRACTION)
                .to_owned();
            let fraction_id = fraction_slug(&fraction);
            pickups.push(RawPickup::new(date, fraction, fraction_id));
        }
    }
    Ok(pickups)
}

/// Year of the selected option in the first picker, or its first option.
fn selected_year(document: &Html) -> Option<i32> {
    let picker = document.select(&PICKER).next()?;
    let chosen = picker
        .select(&SELECTED_OPTION)
        .next()
        .or_else(|| picker.select(&OPTION).next())?;
    let value = chosen.value().attr("value")?;
    YEAR.captures(value)?.get(1)?.as_str().parse().ok()
}

fn row_date(cell: ElementRef<'_>, year: i32) -> Option<NaiveDate> {
    let text = cell.text().collect::<Vec<_>>().join(" ");
    let found = DAY_MONTH.captures(&text)?;
    let day = found.get(1)?.as_str().parse().ok()?;
    let month = found.get(2)?.as_str().parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Lower-cased name with whitespace runs replaced by `-`.
fn fraction_slug(name: &str) -> String {
    WHITESPACE.replace_all(&name.to_lowercase(), "-").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
<div class="waste-calendar-wrapper">
  <form>
    <select name="year" id="year-picker">
      <option value="/tommekalender/show?year=2026">2026</option>
      <option value="/tommekalender/show?year=2027" selected="selected">2027</option>
    </select>
  </form>
  <table class="waste-calendar js-waste-calendar">
    <thead><tr><th>Dato</th><th>Avfall</th></tr></thead>
    <tbody>
      <tr class="waste-calendar__item">
        <td>Man <span class="date">4.1</span></td>
        <td>
          <img src="/icons/rest.svg" alt="" title="Restavfall">
          <img src="/icons/papir.svg" alt="" title="Papp og  papir">
        </td>
      </tr>
      <tr class="waste-calendar__item waste-calendar__item--holiday">
        <td>Tor 14.01</td>
        <td><img src="/icons/mat.svg" title="Matavfall"><img src="/icons/x.svg"></td>
      </tr>
      <tr class="waste-calendar__header"><td>Februar</td><td></td></tr>
      <tr class="waste-calendar__item"><td>Helligdag</td><td><img title="Restavfall"></td></tr>
      <tr class="waste-calendar__item"><td>31.02</td><td><img title="Glass- og metallemballasje"></td></tr>
      <tr class="waste-calendar__item"><td>18.02</td><td><img title="Gl&aring;ss &amp; metall"></td></tr>
    </tbody>
  </table>
</div>"#;

    fn provider() -> ProviderId {
        ProviderId::from("renovasjonen")
    }

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
    }

    #[test]
    fn parses_rows_with_selected_year() {
        let pickups = parse_calendar_html(&provider(), PAGE, 1999).expect("calendar");

        let expected = [
            RawPickup::new(date(2027, 1, 4), "Restavfall", "restavfall"),
            RawPickup::new(date(2027, 1, 4), "Papp og  papir", "papp-og-papir"),
            RawPickup::new(date(2027, 1, 14), "Matavfall", "matavfall"),
            RawPickup::new(date(2027, 1, 14), "Ukjent", "ukjent"),
            RawPickup::new(date(2027, 2, 18), "Glåss & metall", "glåss-&-metall"),
        ];
        assert_eq!(pickups, expected, "one tuple per row and image, bad rows skipped");
    }

    #[test]
    fn first_option_when_none_selected() {
        let page = PAGE.replace(r#" selected="selected""#, "");
        let pickups = parse_calendar_html(&provider(), &page, 1999).expect("calendar");
        assert!(pickups.iter().all(|pickup| pickup.date.format("%Y").to_string() == "2026"), "first option");
    }

    #[test]
    fn fallback_year_without_picker() {
        let page = r#"<table class="waste-calendar"><tr class="waste-calendar__item"><td>02.11</td>
            <td><img title="Restavfall"></td></tr></table>"#;
        let pickups = parse_calendar_html(&provider(), page, 2026).expect("calendar");
        assert_eq!(pickups.first().map(|pickup| pickup.date), Some(date(2026, 11, 2)), "fallback year");
    }

    #[test]
    fn empty_calendar_is_not_an_error() {
        let page = r#"<table class="waste-calendar"><tbody></tbody></table>"#;
        let pickups = parse_calendar_html(&provider(), page, 2026).expect("calendar");
        assert!(pickups.is_empty(), "no rows");
    }

    #[test]
    fn reads_real_attributes_and_decodes_entities() {
        let page = r#"<table class="waste-calendar"><tbody>
            <tr data-class="x" class="waste-calendar__item">
              <td>Ons&nbsp;05.11</td>
              <td>
                <img data-title="ikon-rest" title="Restavfall">
                <img title="Papp&#47;papir">
                <img title="Glass- &#x26; metallemballasje">
              </td>
            </tr>
        </tbody></table>"#;
        let pickups = parse_calendar_html(&provider(), page, 2026).expect("calendar");

        let expected = [
            RawPickup::new(date(2026, 11, 5), "Restavfall", "restavfall"),
            RawPickup::new(date(2026, 11, 5), "Papp/papir", "papp/papir"),
            RawPickup::new(date(2026, 11, 5), "Glass- & metallemballasje", "glass-&-metallemballasje"),
        ];
        assert_eq!(pickups, expected, "title attribute only, entities decoded");
    }

    #[test]
    fn page_without_calendar_is_malformed() {
        let err = parse_calendar_html(&provider(), "<html><body>Fant ikke adressen</body></html>", 2026)
            .expect_err("no calendar");
        assert!(matches!(err, PortError::Malformed { .. }), "malformed");
    }
}
