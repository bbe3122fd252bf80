use iced::widget::{Space, button, column, container, row, scrollable, text, text_input};
use iced::{Alignment, Element, Length};

use crate::Message;
use crate::api::{Connection, ConnectionList, DEFAULT_PORT, TestResult};
use crate::ui::{neutral_button_style, panel_style};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Name,
    Host,
    Port,
    User,
    Password,
    Fingerprint,
}

/// Editable text of the add/edit form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionForm {
    pub name: String,
    pub host: String,
    pub port: String,
    pub user: String,
    pub password: String,
    pub fingerprint: String,
}

impl Default for ConnectionForm {
    fn default() -> Self {
        Self {
            name: String::new(),
            host: String::new(),
            port: DEFAULT_PORT.to_string(),
            user: String::new(),
            password: String::new(),
            fingerprint: String::new(),
        }
    }
}

impl ConnectionForm {
    /// Prefill from a saved connection. The password is never echoed back.
    pub fn from_connection(connection: &Connection) -> Self {
        Self {
            name: connection.name.clone(),
            host: connection.host.clone(),
            port: connection.port.to_string(),
            user: connection.user.clone(),
            password: String::new(),
            fingerprint: connection.fingerprint.clone(),
        }
    }

    pub fn set(&mut self, field: Field, value: String) {
        match field {
            Field::Name => self.name = value,
            Field::Host => self.host = value,
            Field::Port => self.port = value,
            Field::User => self.user = value,
            Field::Password => self.password = value,
            Field::Fingerprint => self.fingerprint = value,
        }
    }

    fn port(&self) -> Option<u16> {
        let port = self.port.trim();
        if port.is_empty() {
            Some(DEFAULT_PORT)
        } else {
            port.parse().ok()
        }
    }

    fn connection(&self) -> Option<Connection> {
        Some(Connection {
            name: self.name.trim().to_string(),
            host: self.host.trim().to_string(),
            port: self.port()?,
            user: self.user.trim().to_string(),
            password: self.password.clone(),
            fingerprint: self.fingerprint.trim().to_string(),
        })
    }

    /// Enough to try a login: host, user and password.
    pub fn testable(&self) -> Option<Connection> {
        let connection = self.connection()?;
        let ready = !connection.host.is_empty()
            && !connection.user.is_empty()
            && !connection.password.is_empty();
        ready.then_some(connection)
    }

    /// Enough to save: a testable connection with a name.
    pub fn savable(&self) -> Option<Connection> {
        self.testable().filter(|connection| !connection.name.is_empty())
    }
}

fn field<'a>(
    label: &'static str,
    value: &'a str,
    which: Field,
    secure: bool,
) -> Element<'a, Message> {
    row![
        text(label).size(12).width(Length::Fixed(90.0)),
        text_input(label, value)
            .secure(secure)
            .size(12)
            .on_input(move |value| Message::ConnectionFieldChanged(which, value)),
    ]
    .spacing(6)
    .align_y(Alignment::Center)
    .into()
}

#[derive(Debug, Default)]
pub struct ConnectionsPage {
    pub list: ConnectionList,
    pub form: ConnectionForm,
    /// Index of the connection being edited, `None` while adding.
    pub editing: Option<usize>,
    pub testing: bool,
    pub test_result: Option<TestResult>,
    pub error: Option<String>,
}

impl ConnectionsPage {
    pub fn active(&self) -> Option<usize> {
        self.list
            .active
            .filter(|&index| index < self.list.connections.len())
    }

    pub fn edit(&mut self, index: usize) {
        if let Some(connection) = self.list.connections.get(index) {
            self.form = ConnectionForm::from_connection(connection);
            self.editing = Some(index);
            self.test_result = None;
        }
    }

    pub fn reset_form(&mut self) {
        self.form = ConnectionForm::default();
        self.editing = None;
        self.test_result = None;
    }

    pub fn view(&self) -> Element<'_, Message> {
        let mut list = column![text("Connections").size(20)].spacing(6);
        if self.list.connections.is_empty() {
            list = list.push(text("No connections saved yet.").size(12));
        }

        for (index, connection) in self.list.connections.iter().enumerate() {
            let is_active = self.active() == Some(index);
            let activate: Element<'_, Message> = if is_active {
                text("Active").size(12).into()
            } else {
                button(text("Activate").size(12))
                    .on_press(Message::ActivateConnection(index))
                    .into()
            };

            list = list.push(
                row![
                    column![
                        text(&connection.name).size(14),
                        text(connection.address()).size(11),
                    ]
                    .width(Length::Fill),
                    activate,
                    button(text("Edit").size(12))
                        .style(neutral_button_style)
                        .on_press(Message::EditConnection(index)),
                    button(text("Delete").size(12))
                        .style(button::danger)
                        .on_press(Message::DeleteConnection(index)),
                ]
                .spacing(6)
                .align_y(Alignment::Center),
            );
        }

        let title = if self.editing.is_some() {
            "Edit connection"
        } else {
            "Add connection"
        };

        let test_status: Element<'_, Message> = match (&self.test_result, self.testing) {
            (_, true) => text("Testing…").size(12).into(),
            (Some(result), false) => {
                let mark = if result.success { "✓" } else { "✗" };
                text(format!("{mark} {}", result.message)).size(12).into()
            }
            (None, false) => Space::new().width(Length::Shrink).into(),
        };

        let form = column![
            text(title).size(16),
            field("Name", &self.form.name, Field::Name, false),
            field("Host", &self.form.host, Field::Host, false),
            field("Port", &self.form.port, Field::Port, false),
            field("User", &self.form.user, Field::User, false),
            field("Password", &self.form.password, Field::Password, true),
            field("Fingerprint", &self.form.fingerprint, Field::Fingerprint, false),
            row![
                button(text("Save").size(12))
                    .on_press_maybe(self.form.savable().map(|_| Message::SaveConnection)),
                button(text("Test").size(12)).on_press_maybe(
                    (!self.testing && self.form.testable().is_some())
                        .then_some(Message::TestConnection)
                ),
                button(text("Cancel").size(12))
                    .style(neutral_button_style)
                    .on_press(Message::CancelEdit),
                test_status,
            ]
            .spacing(6)
            .align_y(Alignment::Center),
        ]
        .spacing(6)
        .width(Length::Fixed(360.0));

        let error: Element<'_, Message> = match &self.error {
            Some(error) => text(error).size(12).into(),
            None => Space::new().height(Length::Shrink).into(),
        };

        container(
            column![
                row![scrollable(list).width(Length::Fill), form].spacing(20),
                error
            ]
            .spacing(10)
            .padding(10),
        )
        .width(Length::Fill)
        .height(Length::Fill)
        .style(panel_style)
        .into()
    }
}
