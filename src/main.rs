mod api;
mod config;
mod connections;
mod detail;
mod error;
mod location;
mod symbols;
mod sync;
mod timeline;
mod toolbar;
mod ui;

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Local;
use clap::Parser;
use iced::widget::column;
use iced::{Element, Subscription, Task};
use iced_aw::{TabLabel, tab_bar};
use tracing_subscriber::{EnvFilter, fmt};

use api::{ConnectionList, EventSource, HttpApi, TestResult};
use config::Config;
use connections::{ConnectionsPage, Field};
use detail::{DetailState, JsonDetailView};
use location::Location;
use sync::{DataSync, FetchRequest, Plan};
use timeline::lanes::LaneLayout;
use timeline::viewport::{ViewportTransform, WheelInput};
use timeline::{Event, TimeWindow, TimelineProps};
use toolbar::{
    AUTO_REFRESH_PERIOD, ToolbarProps, format_range, format_start, parse_start, starting_at,
};

pub const TIMELINE_TAB: usize = 0;
pub const CONNECTIONS_TAB: usize = 1;

pub fn main() -> iced::Result {
    fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .with_writer(std::io::stderr)
        .init();

    let config = Config::parse();
    let api: Arc<dyn EventSource> = match HttpApi::new(&config.api_base, &config.connections_base) {
        Ok(api) => Arc::new(api),
        Err(error) => {
            tracing::error!(%error, "could not set up the HTTP client");
            std::process::exit(1);
        }
    };
    tracing::info!(api = %config.api_base, "starting");

    iced::application(
        move || QueryLane::new(&config, api.clone()),
        QueryLane::update,
        QueryLane::view,
    )
    .title(QueryLane::title)
    .subscription(QueryLane::subscription)
    .run()
}

#[derive(Debug, Clone)]
pub enum Message {
    TabSelected(usize),
    Wheel {
        input: WheelInput,
        width: f64,
    },
    LocationDue(u64),
    FetchDue(u64),
    EventsLoaded {
        request: FetchRequest,
        result: Result<Vec<Event>, String>,
    },
    SearchChanged(String),
    QuickRange(f64),
    StartInputChanged(String),
    StartSubmitted,
    AutoRefreshToggled(bool),
    AutoRefreshTick,
    Flush,
    Flushed(Result<(), String>),
    EventClicked(String),
    DetailLoaded {
        id: String,
        result: Result<serde_json::Value, String>,
    },
    CloseDetail,
    GroupToggled(String),
    CopyLocation,
    ConnectionsLoaded(Result<ConnectionList, String>),
    ConnectionFieldChanged(Field, String),
    EditConnection(usize),
    DeleteConnection(usize),
    SaveConnection,
    CancelEdit,
    TestConnection,
    ConnectionTested(Result<TestResult, String>),
    ConnectionChanged(Result<(), String>),
    ActivateConnection(usize),
    ConnectionActivated(Result<(), String>),
}

struct QueryLane {
    api: Arc<dyn EventSource>,
    active_tab: usize,
    /// Window the timeline is drawn for; moves only when the location commits.
    window: TimeWindow,
    /// Bumped on every committed window change.
    generation: u64,
    viewport: ViewportTransform,
    query: String,
    events: Vec<Event>,
    layout: LaneLayout,
    hidden_groups: HashSet<String>,
    sync: DataSync,
    location: Location,
    selected: Option<String>,
    detail: Option<DetailState>,
    detail_view: JsonDetailView,
    auto_refresh: bool,
    /// Auto-refresh setting to restore when the detail closes.
    auto_refresh_before_detail: Option<bool>,
    start_input: String,
    start_invalid: bool,
    connections: ConnectionsPage,
}

impl QueryLane {
    fn new(config: &Config, api: Arc<dyn EventSource>) -> (Self, Task<Message>) {
        let now = sync::now();
        let location = match config.location.as_deref() {
            Some(input) => {
                Location::parse(input, now, config.default_window).unwrap_or_else(|error| {
                    tracing::warn!(%error, "ignoring location");
                    Location::recent(now, config.default_window)
                })
            }
            None => Location::recent(now, config.default_window),
        };

        let mut app = QueryLane {
            api,
            active_tab: TIMELINE_TAB,
            window: location.window,
            generation: 0,
            viewport: ViewportTransform::new(0),
            query: String::new(),
            events: Vec::new(),
            layout: LaneLayout::default(),
            hidden_groups: HashSet::new(),
            sync: DataSync::new(),
            location: location.clone(),
            selected: None,
            detail: None,
            detail_view: JsonDetailView::default(),
            auto_refresh: false,
            auto_refresh_before_detail: None,
            start_input: format_start(location.window.start, &Local),
            start_invalid: false,
            connections: ConnectionsPage::default(),
        };

        let mut tasks = vec![app.load(location.window, "", false), app.load_connections()];
        if let Some(id) = location.selected {
            tasks.push(app.open_detail(id));
        }
        (app, Task::batch(tasks))
    }

    fn title(&self) -> String {
        format!("querylane - {}", format_range(self.window.duration()))
    }

    fn subscription(&self) -> Subscription<Message> {
        if self.auto_refresh {
            iced::time::every(AUTO_REFRESH_PERIOD).map(|_| Message::AutoRefreshTick)
        } else {
            Subscription::none()
        }
    }

    /// Route a new window through both debouncers.
    fn change_window(&mut self, window: TimeWindow, force: bool) -> Task<Message> {
        let location = Location {
            window,
            selected: self.selected.clone(),
        };
        Task::batch([
            self.sync.schedule_location(location, Message::LocationDue),
            self.sync
                .schedule_fetch(window, &self.query, force, Message::FetchDue),
        ])
    }

    /// Make `window` the drawn window. The gesture transform starts over.
    fn commit(&mut self, window: TimeWindow) {
        self.window = window;
        self.generation += 1;
        self.viewport.observe(self.generation);
        self.start_input = format_start(window.start, &Local);
        self.start_invalid = false;
        self.location = Location {
            window,
            selected: self.selected.clone(),
        };
        tracing::debug!(location = %self.location, "location committed");
    }

    fn load(&mut self, window: TimeWindow, query: &str, force: bool) -> Task<Message> {
        let request = match self.sync.plan(window, query, force) {
            Plan::Fetch(request) => request,
            Plan::Skip | Plan::Deferred => return Task::none(),
        };
        let api = self.api.clone();
        let fetch_window = request.fetch_window;
        let query = request.key.query.clone();
        Task::perform(
            async move {
                api.fetch_events(fetch_window, &query)
                    .await
                    .map_err(|e| e.to_string())
            },
            move |result| Message::EventsLoaded { request, result },
        )
    }

    fn relayout(&mut self) {
        self.layout = LaneLayout::assign(&self.events);
        self.layout.stack(&self.hidden_groups);
    }

    fn open_detail(&mut self, id: String) -> Task<Message> {
        if self.auto_refresh_before_detail.is_none() {
            self.auto_refresh_before_detail = Some(self.auto_refresh);
        }
        self.auto_refresh = false;
        self.selected = Some(id.clone());
        self.location = self.location.with_selected(self.selected.clone());
        self.detail = Some(DetailState::Loading { id: id.clone() });

        let api = self.api.clone();
        Task::perform(
            {
                let id = id.clone();
                async move { api.fetch_detail(&id).await.map_err(|e| e.to_string()) }
            },
            move |result| Message::DetailLoaded { id, result },
        )
    }

    fn load_connections(&self) -> Task<Message> {
        let api = self.api.clone();
        Task::perform(
            async move { api.connections().await.map_err(|e| e.to_string()) },
            Message::ConnectionsLoaded,
        )
    }

    fn update(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::TabSelected(index) => {
                self.active_tab = index;
            }
            Message::Wheel { input, width } => {
                let committed = self.window;
                let mut target = None;
                self.viewport.apply_with(input, |state| {
                    target = Some(state.window_for(committed, width));
                });
                if let Some(window) = target {
                    return self.change_window(window, false);
                }
            }
            Message::LocationDue(token) => {
                if let Some(location) = self.sync.location_due(token) {
                    self.commit(location.window);
                }
            }
            Message::FetchDue(token) => {
                if let Some((window, query, force)) = self.sync.fetch_due(token) {
                    return self.load(window, &query, force);
                }
            }
            Message::EventsLoaded { request, result } => {
                let completion = self.sync.complete(&request, result);
                if let Some(events) = completion.events {
                    self.events = events;
                    self.relayout();
                }
                if let Some((window, query)) = completion.follow_up {
                    return self.load(window, &query, false);
                }
            }
            Message::SearchChanged(query) => {
                self.query = query;
                return self
                    .sync
                    .schedule_fetch(self.window, &self.query, false, Message::FetchDue);
            }
            Message::QuickRange(seconds) => {
                return self.change_window(TimeWindow::last(seconds, sync::now()), false);
            }
            Message::StartInputChanged(input) => {
                self.start_input = input;
                self.start_invalid = false;
            }
            Message::StartSubmitted => match parse_start(&self.start_input, &Local) {
                Ok(start) => return self.change_window(starting_at(self.window, start), false),
                Err(error) => {
                    tracing::warn!(%error, "rejected start time");
                    self.start_invalid = true;
                }
            },
            Message::AutoRefreshToggled(enabled) => {
                self.auto_refresh = enabled;
            }
            Message::AutoRefreshTick => {
                if self.auto_refresh {
                    return self.change_window(self.window.ending_at(sync::now()), false);
                }
            }
            Message::Flush => {
                if !self.sync.begin_flush() {
                    return Task::none();
                }
                let api = self.api.clone();
                return Task::perform(
                    async move { api.flush().await.map_err(|e| e.to_string()) },
                    Message::Flushed,
                );
            }
            Message::Flushed(result) => {
                let deferred = self.sync.finish_flush();
                match result {
                    Ok(()) => {
                        let window = self.window.ending_at(sync::now());
                        return self.change_window(window, true);
                    }
                    Err(error) => {
                        tracing::error!(%error, "flush failed");
                        if let Some((window, query)) = deferred {
                            return self.load(window, &query, false);
                        }
                    }
                }
            }
            Message::EventClicked(id) => {
                return self.open_detail(id);
            }
            Message::DetailLoaded { id, result } => {
                if self.selected.as_deref() != Some(id.as_str()) {
                    tracing::debug!(%id, "discarding detail of deselected event");
                    return Task::none();
                }
                match result {
                    Ok(detail) => self.detail = Some(DetailState::Ready { id, detail }),
                    Err(error) => tracing::error!(%id, %error, "failed to load detail"),
                }
            }
            Message::CloseDetail => {
                self.selected = None;
                self.detail = None;
                self.location = self.location.with_selected(None);
                if let Some(previous) = self.auto_refresh_before_detail.take() {
                    self.auto_refresh = previous;
                }
            }
            Message::GroupToggled(name) => {
                if !self.hidden_groups.remove(&name) {
                    self.hidden_groups.insert(name);
                }
                self.layout.stack(&self.hidden_groups);
            }
            Message::CopyLocation => {
                return iced::clipboard::write(self.location.to_string());
            }
            Message::ConnectionsLoaded(result) => match result {
                Ok(list) => {
                    self.connections.list = list;
                    self.connections.error = None;
                }
                Err(error) => {
                    tracing::warn!(%error, "failed to list connections");
                    self.connections.error = Some(error);
                }
            },
            Message::ConnectionFieldChanged(field, value) => {
                self.connections.form.set(field, value);
            }
            Message::EditConnection(index) => {
                self.connections.edit(index);
            }
            Message::CancelEdit => {
                self.connections.reset_form();
            }
            Message::SaveConnection => {
                let Some(connection) = self.connections.form.savable() else {
                    return Task::none();
                };
                let editing = self.connections.editing;
                self.connections.reset_form();
                let api = self.api.clone();
                return Task::perform(
                    async move {
                        match editing {
                            Some(index) => api.update_connection(index, &connection).await,
                            None => api.add_connection(&connection).await,
                        }
                        .map_err(|e| e.to_string())
                    },
                    Message::ConnectionChanged,
                );
            }
            Message::DeleteConnection(index) => {
                if self.connections.editing == Some(index) {
                    self.connections.reset_form();
                }
                let api = self.api.clone();
                return Task::perform(
                    async move { api.delete_connection(index).await.map_err(|e| e.to_string()) },
                    Message::ConnectionChanged,
                );
            }
            Message::ConnectionChanged(result) => {
                if let Err(error) = result {
                    tracing::error!(%error, "connection update failed");
                    self.connections.error = Some(error);
                }
                return self.load_connections();
            }
            Message::TestConnection => {
                let Some(connection) = self.connections.form.testable() else {
                    return Task::none();
                };
                self.connections.testing = true;
                self.connections.test_result = None;
                let api = self.api.clone();
                return Task::perform(
                    async move {
                        api.test_connection(&connection)
                            .await
                            .map_err(|e| e.to_string())
                    },
                    Message::ConnectionTested,
                );
            }
            Message::ConnectionTested(result) => {
                self.connections.testing = false;
                self.connections.test_result = Some(result.unwrap_or_else(|error| TestResult {
                    success: false,
                    message: format!("Request failed: {error}"),
                }));
            }
            Message::ActivateConnection(index) => {
                let api = self.api.clone();
                return Task::perform(
                    async move {
                        api.activate_connection(index)
                            .await
                            .map_err(|e| e.to_string())
                    },
                    Message::ConnectionActivated,
                );
            }
            Message::ConnectionActivated(result) => match result {
                Ok(()) => {
                    self.events.clear();
                    self.relayout();
                    self.sync.invalidate();
                    let query = self.query.clone();
                    return Task::batch([
                        self.load(self.window, &query, true),
                        self.load_connections(),
                    ]);
                }
                Err(error) => {
                    tracing::error!(%error, "failed to activate connection");
                    self.connections.error = Some(error);
                }
            },
        }
        Task::none()
    }

    fn view(&self) -> Element<'_, Message> {
        let bar = tab_bar::TabBar::new(Message::TabSelected)
            .push(TIMELINE_TAB, TabLabel::Text("Timeline".to_string()))
            .push(CONNECTIONS_TAB, TabLabel::Text("Connections".to_string()))
            .set_active_tab(&self.active_tab);

        let content = match self.active_tab {
            CONNECTIONS_TAB => self.connections.view(),
            _ => self.timeline_view(),
        };

        column![bar, content].into()
    }

    fn timeline_view(&self) -> Element<'_, Message> {
        let toolbar = toolbar::view(ToolbarProps {
            query: &self.query,
            start_input: &self.start_input,
            start_invalid: self.start_invalid,
            window: self.window,
            auto_refresh: self.auto_refresh,
            loading: self.sync.is_loading(),
            location: self.location.to_string(),
            connections: &self.connections.list.connections,
            active_connection: self.connections.active(),
        });

        let timeline = timeline::view(TimelineProps {
            events: &self.events,
            layout: &self.layout,
            window: self.window,
            viewport: self.viewport.state(),
            selected: self.selected.as_deref(),
        });

        let mut content = column![toolbar, timeline];
        if let Some(detail) = &self.detail {
            content = content.push(detail::panel(detail, &self.detail_view));
        }
        content.into()
    }
}
