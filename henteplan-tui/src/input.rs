use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::app::{App, Screen};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Action {
    None,
    Quit,
    /// Run `service.detect` for the typed postal code or city
    DetectProvider,
    /// Run `service.search` for the typed query
    SearchAddresses,
    /// Run `service.schedule` for the highlighted address
    LoadScheduleForCurrentAddress,
}

pub(crate) fn handle_key_event(key: KeyEvent, app: &mut App) -> Action {
    use KeyCode::{Backspace, Char, Down, Enter, Esc, Left, Right, Tab, Up};

    if key.code == Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return Action::Quit;
    }
    if app.screen == Screen::ProviderSelect && app.detect_editing {
        return handle_detect_input(key, app);
    }
    // Letters are query text on the search screen.
    if key.code == Char('q') && key.modifiers.is_empty() && app.screen != Screen::AddressSearch {
        return Action::Quit;
    }

    let mut action = Action::None;

    match app.screen {
        Screen::ProviderSelect => match key.code {
            Up | Char('k') => {
                app.provider_list_index = app.provider_list_index.saturating_sub(1);
            }
            Down | Char('j') => {
                if app.provider_list_index + 1 < app.provider_rows() {
                    app.provider_list_index += 1;
                }
            }
            Enter | Char(' ') => {
                app.select_current_provider();
            }
            Char('/') => {
                app.detect_editing = true;
                app.detect_input.clear();
            }
            _ => {}
        },

        Screen::AddressSearch => match key.code {
            Up => {
                app.address_list_index = app.address_list_index.saturating_sub(1);
            }
            Down => {
                if app.address_list_index + 1 < app.address_results.len() {
                    app.address_list_index += 1;
                }
            }
            Char(character) => {
                if !key.modifiers.contains(KeyModifiers::CONTROL)
                    && !key.modifiers.contains(KeyModifiers::ALT)
                {
                    app.address_input.push(character);
                }
            }
            Backspace => {
                app.address_input.pop();
            }
            Enter => {
                action = Action::SearchAddresses;
            }
            Right | Tab => {
                action = Action::LoadScheduleForCurrentAddress;
            }
            Left | Esc => {
                app.screen = Screen::ProviderSelect;
                app.address_results.clear();
                app.address_list_index = 0;
            }
            _ => {}
        },

        Screen::ScheduleView => {
            if matches!(key.code, Left | Esc | Char('b')) {
                app.screen = Screen::AddressSearch;
            }
        }
    }
    action
}

fn handle_detect_input(key: KeyEvent, app: &mut App) -> Action {
    match key.code {
        KeyCode::Char(character) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.detect_input.push(character);
        }
        KeyCode::Backspace => {
            app.detect_input.pop();
        }
        KeyCode::Enter => return Action::DetectProvider,
        KeyCode::Esc => app.detect_editing = false,
        _ => {}
    }
    Action::None
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use henteplan_core::{HenteplanService, ProviderDetector, ProviderRegistry};

    use super::*;

    fn app() -> App {
        let registry = Arc::new(ProviderRegistry::new(Vec::new()));
        let detector = Arc::new(ProviderDetector::new(&[], None));
        App::new(Arc::new(HenteplanService::new(registry, detector)))
    }

    fn press(app: &mut App, code: KeyCode) -> Action {
        handle_key_event(KeyEvent::new(code, KeyModifiers::NONE), app)
    }

    #[test]
    fn q_types_on_search_screen() {
        let mut app = app();
        assert_eq!(press(&mut app, KeyCode::Enter), Action::None, "select all providers");
        assert_eq!(app.screen, Screen::AddressSearch, "on search screen");
        assert_eq!(app.selected_provider, None, "fan-out scope");

        assert_eq!(press(&mut app, KeyCode::Char('q')), Action::None, "typed");
        assert_eq!(app.address_input, "q", "query text");
        assert_eq!(press(&mut app, KeyCode::Enter), Action::SearchAddresses, "search");
    }

    #[test]
    fn q_quits_elsewhere() {
        let mut app = app();
        assert_eq!(press(&mut app, KeyCode::Char('q')), Action::Quit, "quit");
    }

    #[test]
    fn slash_opens_detect_input() {
        let mut app = app();
        press(&mut app, KeyCode::Char('/'));
        for character in "7013".chars() {
            press(&mut app, KeyCode::Char(character));
        }
        assert_eq!(app.detect_input, "7013", "typed postal code");
        assert_eq!(press(&mut app, KeyCode::Char('q')), Action::None, "q is text here");
        press(&mut app, KeyCode::Backspace);
        assert_eq!(press(&mut app, KeyCode::Enter), Action::DetectProvider, "detect");
        assert_eq!(press(&mut app, KeyCode::Esc), Action::None, "cancel");
        assert!(!app.detect_editing, "editing closed");
    }

    #[test]
    fn provider_cursor_stays_in_bounds() {
        let mut app = app();
        press(&mut app, KeyCode::Up);
        press(&mut app, KeyCode::Down);
        assert_eq!(app.provider_list_index, 0, "only the all-providers row");
    }
}
