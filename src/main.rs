#[macro_use]
mod macros;

mod activity;
mod bridge;
mod config;
mod controller;
mod error;
mod models;
mod relay;
mod settings;
#[cfg(test)]
mod testing;

use iced::{
    widget::{button, center, column, container, opaque, row, scrollable, stack, text, text_input, text_input::Id, Column},
    Color, Element, Length, Task, Theme, Font, Subscription,
    time, clipboard,
    keyboard::{self, Key},
    event::{self, Event as IcedEvent},
    alignment, Padding,
    window,
};
use std::time::Duration;

use bridge::Bridge;
use controller::{Controller, Dispatch, Operation};
use error::RelayError;
use activity::Kind;
use models::{RelayResult, Role};
use relay::HttpRelay;
use settings::FileSettingsStore;

const LOADING_FRAMES: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

fn render_content(content: &str) -> Element<'static, Message> {
    // Replies are shown verbatim, newlines included
    text(content.to_string())
        .size(15)
        .into()
}

fn main() -> iced::Result {
    let config = config::Config::load();

    let bridge = match Bridge::spawn(HttpRelay::new()) {
        Ok(bridge) => bridge,
        Err(e) => {
            eprintln!("Failed to start relay: {}", e);
            std::process::exit(1);
        }
    };

    iced::application("LM Desk", App::update, App::view)
        .theme(App::theme)
        .subscription(App::subscription)
        .window(window::Settings {
            size: iced::Size::new(config.window.width as f32, config.window.height as f32),
            min_size: Some(iced::Size::new(
                config.window.min_width as f32,
                config.window.min_height as f32,
            )),
            position: window::Position::Centered,
            ..Default::default()
        })
        .default_font(Font::MONOSPACE)
        .run_with(move || App::new(bridge))
}

#[derive(Debug, Clone)]
enum Message {
    InputChanged(String),
    Submit,
    TestConnection,
    Relayed(Operation, Result<RelayResult, RelayError>),
    Clear,
    ToggleSettings,
    BaseUrlChanged(String),
    ModelChanged(String),
    SaveSettings,
    ResetSettings,
    DismissNotice,
    CopyLastReply,
    Tick,
    Exit,
}

struct App {
    controller: Controller,
    bridge: Bridge,
    show_settings: bool,
    loading_frame: usize,
    input_id: Id,
    transcript_id: scrollable::Id,
}

impl App {
    fn new(bridge: Bridge) -> (Self, Task<Message>) {
        activity::log("LM Desk starting up");
        let controller = Controller::new(Box::new(FileSettingsStore::default_location()));
        let input_id = Id::unique();

        let app = App {
            controller,
            bridge,
            show_settings: false,
            loading_frame: 0,
            input_id: input_id.clone(),
            transcript_id: scrollable::Id::unique(),
        };

        (app, text_input::focus(input_id))
    }

    fn update(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::InputChanged(value) => {
                self.controller.set_input(value);
                Task::none()
            }
            Message::Submit => match self.controller.submit() {
                Some(dispatch) => Task::batch([self.dispatch(dispatch), self.scroll_to_end()]),
                None => Task::none(),
            },
            Message::TestConnection => match self.controller.test_connection() {
                Some(dispatch) => self.dispatch(dispatch),
                None => Task::none(),
            },
            Message::Relayed(operation, result) => {
                self.controller.complete(operation, result);
                self.loading_frame = 0;
                Task::batch([self.scroll_to_end(), text_input::focus(self.input_id.clone())])
            }
            Message::Clear => {
                self.controller.clear();
                Task::none()
            }
            Message::ToggleSettings => {
                self.show_settings = !self.show_settings;
                Task::none()
            }
            Message::BaseUrlChanged(value) => {
                self.controller.staged_mut().base_url = value;
                Task::none()
            }
            Message::ModelChanged(value) => {
                self.controller.staged_mut().model = value;
                Task::none()
            }
            Message::SaveSettings => {
                self.controller.save_staged();
                self.scroll_to_end()
            }
            Message::ResetSettings => {
                self.controller.reset_configuration();
                self.scroll_to_end()
            }
            Message::DismissNotice => {
                self.controller.dismiss_notice();
                Task::none()
            }
            Message::CopyLastReply => match self.controller.last_reply() {
                Some(reply) => clipboard::write(reply.content.clone()),
                None => Task::none(),
            },
            Message::Tick => {
                if self.controller.is_busy() {
                    self.loading_frame = (self.loading_frame + 1) % LOADING_FRAMES.len();
                }
                Task::none()
            }
            Message::Exit => {
                iced::exit()
            }
        }
    }

    fn dispatch(&self, dispatch: Dispatch) -> Task<Message> {
        let bridge = self.bridge.clone();
        Task::future(async move {
            let operation = dispatch.operation;
            let result = bridge.invoke(dispatch.descriptor).await;
            Message::Relayed(operation, result)
        })
    }

    fn scroll_to_end(&self) -> Task<Message> {
        scrollable::snap_to(self.transcript_id.clone(), scrollable::RelativeOffset::END)
    }

    fn subscription(&self) -> Subscription<Message> {
        let timer = if self.controller.is_busy() {
            time::every(Duration::from_millis(80)).map(|_| Message::Tick)
        } else {
            Subscription::none()
        };

        let events = event::listen_with(|event, _status, _id| {
            if let IcedEvent::Keyboard(keyboard::Event::KeyPressed {
                key: Key::Named(keyboard::key::Named::Escape),
                ..
            }) = event
            {
                Some(Message::Exit)
            } else {
                None
            }
        });

        Subscription::batch([timer, events])
    }

    fn view(&self) -> Element<Message> {
        let busy = self.controller.is_busy();

        let header = row![
            text(format!("Connected to {}", self.controller.settings().base_url))
                .size(14)
                .width(Length::Fill),
            button(text("Test Connection").size(14))
                .on_press_maybe((!busy).then_some(Message::TestConnection))
                .padding(8),
            button(text(if self.show_settings { "Hide Settings" } else { "Settings" }).size(14))
                .on_press(Message::ToggleSettings)
                .style(button::secondary)
                .padding(8),
            button(text("Clear").size(14))
                .on_press_maybe((!busy).then_some(Message::Clear))
                .style(button::danger)
                .padding(8),
        ]
        .spacing(8)
        .align_y(alignment::Vertical::Center);

        let mut content_column = column![header].spacing(10).padding(10);

        if self.show_settings {
            content_column = content_column.push(self.settings_panel());
        }

        content_column = content_column.push(self.transcript_view(busy));

        let input = text_input("Type your message...", self.controller.input())
            .on_input(Message::InputChanged)
            .on_submit(Message::Submit)
            .padding(15)
            .size(18)
            .id(self.input_id.clone());

        let send_allowed = !busy && !self.controller.input().trim().is_empty();
        let input_row = row![
            input,
            button(text("Send").size(16))
                .on_press_maybe(send_allowed.then_some(Message::Submit))
                .padding(15),
        ]
        .spacing(10)
        .align_y(alignment::Vertical::Center);

        content_column = content_column.push(input_row);

        let status = match activity::latest() {
            Some(entry) => {
                let style: fn(&Theme) -> text::Style = match entry.kind {
                    Kind::Failure => text::danger,
                    Kind::Response => text::success,
                    Kind::Info | Kind::Request | Kind::Settings => text::default,
                };
                text(entry.text).style(style)
            }
            None => text(""),
        };
        let mut footer = row![status.size(12).width(Length::Fill)]
            .align_y(alignment::Vertical::Center);

        if self.controller.last_reply().is_some() && !busy {
            footer = footer.push(
                button(text("[Copy]").size(14))
                    .on_press(Message::CopyLastReply)
                    .padding(10),
            );
        }

        content_column = content_column.push(container(footer).padding(Padding::from([0, 10])));

        let base = container(content_column)
            .width(Length::Fill)
            .height(Length::Fill);

        match self.controller.notice() {
            Some(notice) => stack![base, self.notice_overlay(notice)].into(),
            None => base.into(),
        }
    }

    // Covers the whole window until the notice is dismissed.
    fn notice_overlay(&self, notice: &str) -> Element<Message> {
        let dialog = container(
            column![
                text(notice.to_string()).size(15),
                button(text("Dismiss").size(14))
                    .on_press(Message::DismissNotice)
                    .padding(8),
            ]
            .spacing(12)
            .align_x(alignment::Horizontal::Center),
        )
        .padding(20)
        .max_width(480)
        .style(container::rounded_box);

        opaque(center(opaque(dialog)).style(|_theme| container::Style {
            background: Some(
                Color {
                    a: 0.8,
                    ..Color::BLACK
                }
                .into(),
            ),
            ..container::Style::default()
        }))
    }

    fn settings_panel(&self) -> Element<Message> {
        let staged = self.controller.staged();

        container(
            column![
                text("Server URL").size(13),
                text_input(settings::DEFAULT_BASE_URL, &staged.base_url)
                    .on_input(Message::BaseUrlChanged)
                    .padding(8),
                text("Model").size(13),
                text_input(settings::DEFAULT_MODEL, &staged.model)
                    .on_input(Message::ModelChanged)
                    .padding(8),
                row![
                    button(text("Save").size(14))
                        .on_press(Message::SaveSettings)
                        .padding(8),
                    button(text("Reset to Defaults").size(14))
                        .on_press(Message::ResetSettings)
                        .style(button::secondary)
                        .padding(8),
                ]
                .spacing(8),
            ]
            .spacing(6),
        )
        .padding(10)
        .width(Length::Fill)
        .style(container::rounded_box)
        .into()
    }

    fn transcript_view(&self, busy: bool) -> Element<Message> {
        let transcript = self.controller.transcript();

        let mut entries: Vec<Element<Message>> = transcript
            .iter()
            .map(|message| -> Element<Message> {
                let time = message
                    .timestamp
                    .with_timezone(&chrono::Local)
                    .format("%H:%M");
                let bubble = container(
                    column![
                        text(format!("{} · {}", message.role.label(), time)).size(12),
                        render_content(&message.content),
                    ]
                    .spacing(4),
                )
                .padding(10)
                .width(Length::Fill);

                match message.role {
                    Role::User => bubble.style(container::rounded_box).into(),
                    Role::Assistant => bubble.into(),
                }
            })
            .collect();

        if transcript.is_empty() && !busy {
            entries.push(
                container(text("Start a conversation with your local model.").size(15))
                    .width(Length::Fill)
                    .align_x(alignment::Horizontal::Center)
                    .padding(20)
                    .into(),
            );
        }

        if busy {
            entries.push(
                row![
                    text(LOADING_FRAMES[self.loading_frame]).size(20),
                    text("Waiting for the model...").size(15),
                ]
                .spacing(10)
                .align_y(alignment::Vertical::Center)
                .into(),
            );
        }

        scrollable(
            Column::with_children(entries)
                .spacing(10)
                .padding(5)
                .width(Length::Fill),
        )
        .id(self.transcript_id.clone())
        .height(Length::Fill)
        .into()
    }

    fn theme(&self) -> Theme {
        Theme::TokyoNight
    }
}
