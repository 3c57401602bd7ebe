use std::iter;

use chrono::NaiveDate;
use henteplan_core::model::{FractionCategory, WastePickup, today};
use ratatui::{
    prelude::*,
    widgets::{Block, Cell, List, ListItem, ListState, Paragraph, Row, Table, Wrap},
};

use crate::app::{App, Screen};

pub(crate) fn draw(frame: &mut Frame<'_>, app: &App) {
    let [header_area, content_area, status_area] = Layout::vertical([
        Constraint::Length(3),
        Constraint::Fill(1),
        Constraint::Length(3),
    ])
    .margin(1)
    .areas(frame.area());

    frame.render_widget(
        Paragraph::new("henteplan · tømmekalender for husholdningsavfall").block(panel("Henteplan")),
        header_area,
    );

    match app.screen {
        Screen::ProviderSelect => draw_provider_select(frame, app, content_area),
        Screen::AddressSearch => draw_address_search(frame, app, content_area),
        Screen::ScheduleView => draw_schedule_view(frame, app, content_area),
    }

    draw_status(frame, app, status_area);
}

fn draw_status(frame: &mut Frame<'_>, app: &App, area: Rect) {
    let keys = match app.screen {
        Screen::ProviderSelect if app.detect_editing => {
            "postnummer/sted · Enter detect · Esc cancel"
        }
        Screen::ProviderSelect => "↑/↓ · Enter choose · / detect · q quit",
        Screen::AddressSearch => "type query · Enter search · ↑/↓ · Tab schedule · Esc back",
        Screen::ScheduleView => "Esc/b back · q quit",
    };

    let (text, style) = match (&app.error_message, app.is_loading) {
        (Some(message), _) => (format!("{message} · {keys}"), Style::new().red()),
        (None, true) => (format!("Henter… · {keys}"), Style::new().yellow()),
        (None, false) => (keys.to_owned(), Style::new()),
    };

    frame.render_widget(
        Paragraph::new(text).style(style).block(panel("Status")).wrap(Wrap { trim: true }),
        area,
    );
}

fn draw_provider_select(frame: &mut Frame<'_>, app: &App, area: Rect) {
    let [detect_area, list_area] =
        Layout::vertical([Constraint::Length(3), Constraint::Fill(1)]).areas(area);

    let detect_style = if app.detect_editing { Style::new().yellow() } else { Style::new() };
    frame.render_widget(
        Paragraph::new(app.detect_input.as_str())
            .style(detect_style)
            .block(panel("Finn leverandør: postnummer eller sted (/)")),
        detect_area,
    );

    let rows = iter::once(ListItem::new("Alle leverandører")).chain(app.providers.iter().map(|meta| {
        ListItem::new(Line::from(vec![
            Span::raw(meta.name.as_str()),
            Span::styled(format!("  {}", meta.coverage_areas.join(", ")), Style::new().dark_gray()),
        ]))
    }));

    let list = List::new(rows)
        .block(panel("Leverandør"))
        .highlight_symbol("> ")
        .highlight_style(highlight());

    let mut state = ListState::default().with_selected(Some(app.provider_list_index));
    frame.render_stateful_widget(list, list_area, &mut state);
}

fn draw_address_search(frame: &mut Frame<'_>, app: &App, area: Rect) {
    let [query_area, results_area] =
        Layout::vertical([Constraint::Length(3), Constraint::Fill(1)]).areas(area);

    frame.render_widget(
        Paragraph::new(app.address_input.as_str())
            .block(panel(format!("Adresse i {}", app.scope_name()))),
        query_area,
    );

    let hits: Vec<ListItem<'_>> = if app.address_results.is_empty() {
        vec![ListItem::new("Ingen treff ennå. Skriv gate og husnummer.")]
    } else {
        app.address_results
            .iter()
            .map(|hit| {
                ListItem::new(Line::from(vec![
                    Span::raw(hit.label.as_str()),
                    Span::styled(format!("  [{}]", hit.provider), Style::new().dark_gray()),
                ]))
            })
            .collect()
    };

    let selected = (!app.address_results.is_empty()).then_some(app.address_list_index);
    let mut state = ListState::default().with_selected(selected);
    frame.render_stateful_widget(
        List::new(hits).block(panel("Treff")).highlight_style(highlight()),
        results_area,
        &mut state,
    );
}

fn draw_schedule_view(frame: &mut Frame<'_>, app: &App, area: Rect) {
    let title = app.selected_address.as_ref().map_or_else(
        || "Tømmekalender".to_owned(),
        |address| format!("Tømmekalender · {}", address.label),
    );

    let placeholder = if app.is_loading {
        Some("Henter tømmekalender…")
    } else if app.pickups.is_empty() {
        Some("Ingen kommende tømminger.")
    } else {
        None
    };
    if let Some(message) = placeholder {
        frame.render_widget(Paragraph::new(message).block(panel(title)), area);
        return;
    }

    let today = today();
    let table = Table::new(
        app.pickups.iter().map(|pickup| pickup_row(pickup, today)),
        [
            Constraint::Length(11),
            Constraint::Length(4),
            Constraint::Length(10),
            Constraint::Length(16),
            Constraint::Fill(1),
        ],
    )
    .header(Row::new(["Dato", "Dag", "Om", "Kategori", "Fraksjon"]).bold())
    .block(panel(title))
    .column_spacing(1);

    frame.render_widget(table, area);
}

fn pickup_row(pickup: &WastePickup, today: NaiveDate) -> Row<'_> {
    let color = Style::new().fg(category_color(pickup.category));
    let style = if pickup.date == today { color.bold() } else { color };
    Row::new([
        Cell::from(pickup.date.format("%d.%m.%Y").to_string()),
        Cell::from(pickup.date.format("%a").to_string()),
        Cell::from(relative_day_label(pickup.date, today)),
        Cell::from(pickup.category.display_name()),
        Cell::from(pickup.fraction.as_str()),
    ])
    .style(style)
}

fn panel<'title, T: Into<Line<'title>>>(title: T) -> Block<'title> {
    Block::bordered().title(title)
}

fn highlight() -> Style {
    Style::new().yellow().bold()
}

fn category_color(category: FractionCategory) -> Color {
    let (red, green, blue) = category.rgb();
    Color::Rgb(red, green, blue)
}

fn relative_day_label(date: NaiveDate, today: NaiveDate) -> String {
    match (date - today).num_days() {
        0 => "i dag".to_owned(),
        1 => "i morgen".to_owned(),
        days if days > 1 => format!("om {days} d"),
        days => format!("{} d siden", days.abs()),
    }
}

#[cfg(test)]
mod tests {
    use chrono::Days;

    use super::*;

    #[test]
    fn relative_labels() {
        let base = NaiveDate::from_ymd_opt(2026, 10, 16).expect("valid date");
        let next = |days: u64| base.checked_add_days(Days::new(days)).expect("in range");
        assert_eq!(relative_day_label(base, base), "i dag", "same day");
        assert_eq!(relative_day_label(next(1), base), "i morgen", "next day");
        assert_eq!(relative_day_label(next(9), base), "om 9 d", "later");
    }

    #[test]
    fn category_colors_follow_hex() {
        assert_eq!(
            category_color(FractionCategory::Paper),
            Color::Rgb(0x3b, 0x82, 0xf6),
            "paper blue"
        );
    }
}
