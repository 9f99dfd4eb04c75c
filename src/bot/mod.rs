//! Chat-facing side of the bot: commands, menu buttons and the multi-step
//! forms for adding plants, logging waterings, photos and groups.

pub mod poller;
mod session;
mod texts;

use crate::dispatcher::Clock;
use crate::error_handler::ServiceError;
use crate::models::{PlantId, UserId, DEFAULT_NOTIFICATION_TIME};
use crate::schedule::pending_plants;
use crate::store::{PlantStore, DEFAULT_HISTORY_LIMIT};
use crate::telegram::{escape_markdown, InlineKeyboardButton, ReplyMarkup};
use session::{Command, Session};
use std::collections::HashMap;
use std::sync::Arc;
use texts::{CANCEL_BUTTON, NO_GROUP_BUTTON, SKIP_BUTTON};
use tokio::sync::Mutex;

const PHOTOS_CALLBACK_PREFIX: &str = "photos_";
const MAX_PHOTOS_SHOWN: usize = 5;

/// What a user sent us, stripped of transport details.
#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    Text(String),
    Photo {
        file_id: String,
        caption: Option<String>,
    },
    Callback(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Text {
        text: String,
        markdown: bool,
        markup: Option<ReplyMarkup>,
    },
    Photo {
        file_id: String,
        caption: Option<String>,
    },
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Reply::Text {
            text: text.into(),
            markdown: false,
            markup: None,
        }
    }

    pub fn markdown(text: impl Into<String>) -> Self {
        Reply::Text {
            text: text.into(),
            markdown: true,
            markup: None,
        }
    }

    pub fn with_markup(self, markup: ReplyMarkup) -> Self {
        match self {
            Reply::Text { text, markdown, .. } => Reply::Text {
                text,
                markdown,
                markup: Some(markup),
            },
            photo => photo,
        }
    }
}

pub struct Conversation {
    store: Arc<dyn PlantStore>,
    clock: Arc<dyn Clock>,
    sessions: Mutex<HashMap<UserId, Session>>,
}

impl Conversation {
    pub fn new(store: Arc<dyn PlantStore>, clock: Arc<dyn Clock>) -> Self {
        Conversation {
            store,
            clock,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Handles one incoming input. Commands and menu buttons abandon any form
    /// in progress; other text continues the current form.
    pub async fn handle(
        &self,
        user_id: UserId,
        first_name: &str,
        input: Input,
    ) -> Result<Vec<Reply>, ServiceError> {
        let session = self.sessions.lock().await.remove(&user_id);

        match input {
            Input::Text(text) => {
                let command = Command::parse(&text).or_else(|| texts::menu_command(&text));
                match (command, session) {
                    (Some(command), _) => self.run_command(user_id, first_name, command).await,
                    (None, Some(session)) => self.continue_form(user_id, session, text.trim()).await,
                    (None, None) => Ok(vec![Reply::text(
                        "Use the menu buttons or /help to see what I can do.",
                    )
                    .with_markup(texts::main_menu())]),
                }
            }
            Input::Photo { file_id, caption } => match session {
                Some(Session::AwaitingPhoto {
                    plant_id,
                    plant_name,
                }) => {
                    self.store
                        .add_photo(plant_id, &file_id, caption.as_deref(), self.clock.now())
                        .await?;
                    Ok(vec![Reply::text(format!(
                        "✅ Photo added to \"{}\"!\nUse /photos to see all photos.",
                        plant_name
                    ))
                    .with_markup(texts::main_menu())])
                }
                other => {
                    self.restore(user_id, other).await;
                    Ok(vec![Reply::text("📸 To add a photo, use /photo first.")])
                }
            },
            Input::Callback(data) => {
                self.restore(user_id, session).await;
                self.callback(user_id, &data).await
            }
        }
    }

    async fn restore(&self, user_id: UserId, session: Option<Session>) {
        if let Some(session) = session {
            self.sessions.lock().await.insert(user_id, session);
        }
    }

    async fn enter(&self, user_id: UserId, session: Session) {
        self.sessions.lock().await.insert(user_id, session);
    }

    async fn run_command(
        &self,
        user_id: UserId,
        first_name: &str,
        command: Command,
    ) -> Result<Vec<Reply>, ServiceError> {
        let reply = match command {
            Command::Start => Reply::text(format!(
                "Hi {}! 🌱\n\nI'm your plant care assistant.\n\
                 Use the menu buttons or /help to see every command.",
                first_name
            ))
            .with_markup(texts::main_menu()),
            Command::Menu => Reply::text("🌿 Main menu:").with_markup(texts::main_menu()),
            Command::Help => Reply::markdown(texts::HELP).with_markup(texts::main_menu()),
            Command::Cancel => cancelled(),
            Command::Unknown(name) => {
                Reply::text(format!("Unknown command /{}. Use /help to see every command.", name))
            }
            Command::Add => {
                self.enter(user_id, Session::AddName).await;
                Reply::text("🌱 What is your plant called?\n(Use /cancel to cancel)")
                    .with_markup(ReplyMarkup::remove())
            }
            Command::Water => {
                return self
                    .start_plant_picker(user_id, Session::WaterPick, "💧 Which plant did you water?")
                    .await
            }
            Command::Photo => {
                return self
                    .start_plant_picker(
                        user_id,
                        Session::PhotoPick,
                        "📸 Which plant do you want to add a photo to?",
                    )
                    .await
            }
            Command::Assign => {
                return self
                    .start_plant_picker(
                        user_id,
                        Session::AssignPlant,
                        "📍 Which plant do you want to move?",
                    )
                    .await
            }
            Command::NewGroup => {
                self.enter(user_id, Session::GroupName).await;
                Reply::text(
                    "📍 What should the group or location be called?\n\
                     For example: Living room, Balcony, Garden, Office\n\n\
                     (Use /cancel to cancel)",
                )
                .with_markup(ReplyMarkup::remove())
            }
            Command::Plants => {
                let plants = self.store.list_plants_for_user(user_id).await?;
                log::info!("Listing {} plants for user {}", plants.len(), user_id);
                if plants.is_empty() {
                    Reply::text(texts::NO_PLANTS_YET)
                } else {
                    Reply::markdown(texts::plant_list(&plants, self.clock.now()))
                }
            }
            Command::Pending => {
                let plants = self.store.list_plants_for_user(user_id).await?;
                let pending = pending_plants(&plants, self.clock.now());
                if plants.is_empty() {
                    Reply::text("🌵 You have no plants yet.")
                } else if pending.is_empty() {
                    Reply::text("✅ All your plants are up to date! 🌿")
                } else {
                    Reply::markdown(texts::pending_list(&pending))
                }
            }
            Command::History => {
                let history = self
                    .store
                    .watering_history(user_id, DEFAULT_HISTORY_LIMIT)
                    .await?;
                if history.is_empty() {
                    Reply::text("📊 No watering history yet.")
                } else {
                    Reply::markdown(texts::history(&history))
                }
            }
            Command::Delete(name) => self.delete(user_id, &name).await?,
            Command::Photos => self.photo_index(user_id).await?,
            Command::Groups => {
                let groups = self.store.list_groups(user_id).await?;
                if groups.is_empty() {
                    Reply::text("📍 You have no groups yet.\nUse /newgroup to create one.")
                } else {
                    Reply::markdown(texts::group_list(&groups))
                }
            }
            Command::Stats => {
                let stats = self.store.watering_stats(user_id, self.clock.now()).await?;
                Reply::markdown(texts::stats(&stats))
            }
            Command::Notifications => self.toggle_notifications(user_id).await?,
        };
        Ok(vec![reply])
    }

    async fn start_plant_picker(
        &self,
        user_id: UserId,
        session: Session,
        prompt: &str,
    ) -> Result<Vec<Reply>, ServiceError> {
        let plants = self.store.list_plants_for_user(user_id).await?;
        if plants.is_empty() {
            return Ok(vec![Reply::text(
                "🌵 You have no plants yet.\nUse /add to add a plant first.",
            )]);
        }

        self.enter(user_id, session).await;
        let markup = texts::picker(plants.iter().map(|p| p.name.as_str()), &[CANCEL_BUTTON]);
        Ok(vec![Reply::text(prompt).with_markup(markup)])
    }

    async fn continue_form(
        &self,
        user_id: UserId,
        session: Session,
        text: &str,
    ) -> Result<Vec<Reply>, ServiceError> {
        if text == CANCEL_BUTTON {
            return Ok(vec![cancelled()]);
        }

        let reply = match session {
            Session::AddName => {
                if text.is_empty() {
                    self.enter(user_id, Session::AddName).await;
                    Reply::text("Please send a name for your plant.")
                } else {
                    self.enter(
                        user_id,
                        Session::AddInterval {
                            name: text.to_string(),
                        },
                    )
                    .await;
                    Reply::text(format!(
                        "Great! Every how many days does \"{}\" need water?\n\
                         (Send a number, for example: 3)",
                        text
                    ))
                }
            }
            Session::AddInterval { name } => match text.parse::<i32>() {
                Ok(days) if days > 0 => {
                    self.enter(
                        user_id,
                        Session::AddType {
                            name,
                            interval_days: days,
                        },
                    )
                    .await;
                    Reply::text("What type of plant is it? (for example: succulent, fern)")
                        .with_markup(texts::picker(std::iter::empty(), &[SKIP_BUTTON]))
                }
                Ok(_) => {
                    self.enter(user_id, Session::AddInterval { name }).await;
                    Reply::text("Please enter a number greater than 0.")
                }
                Err(_) => {
                    self.enter(user_id, Session::AddInterval { name }).await;
                    Reply::text(
                        "Please enter a valid number.\nEvery how many days does it need water?",
                    )
                }
            },
            Session::AddType {
                name,
                interval_days,
            } => {
                let plant_type = (text != SKIP_BUTTON && !text.is_empty()).then_some(text);
                self.add_plant(user_id, &name, interval_days, plant_type)
                    .await?
            }
            Session::WaterPick => match self.store.get_plant_by_name(user_id, text).await? {
                Some(plant) => {
                    self.store
                        .record_watering(plant.id, self.clock.now())
                        .await?;
                    Reply::text(format!(
                        "✅ Watering logged for \"{}\"!\nNext watering recommended in {} day(s)",
                        plant.name, plant.interval_days
                    ))
                    .with_markup(texts::main_menu())
                }
                None => plant_not_found(),
            },
            Session::PhotoPick => match self.store.get_plant_by_name(user_id, text).await? {
                Some(plant) => {
                    let prompt = format!("📸 Great! Now send a photo of \"{}\"", plant.name);
                    self.enter(
                        user_id,
                        Session::AwaitingPhoto {
                            plant_id: plant.id,
                            plant_name: plant.name,
                        },
                    )
                    .await;
                    Reply::text(prompt).with_markup(ReplyMarkup::remove())
                }
                None => plant_not_found(),
            },
            Session::AwaitingPhoto {
                plant_id,
                plant_name,
            } => {
                let prompt = format!("📸 Send a photo of \"{}\", or /cancel.", plant_name);
                self.enter(
                    user_id,
                    Session::AwaitingPhoto {
                        plant_id,
                        plant_name,
                    },
                )
                .await;
                Reply::text(prompt)
            }
            Session::GroupName => {
                if text.is_empty() {
                    self.enter(user_id, Session::GroupName).await;
                    Reply::text("Please send a name for the group.")
                } else {
                    self.create_group(user_id, text).await?
                }
            }
            Session::AssignPlant => match self.store.get_plant_by_name(user_id, text).await? {
                Some(plant) => {
                    let groups = self.store.list_groups(user_id).await?;
                    if groups.is_empty() {
                        Reply::text("📍 You have no groups yet.\nUse /newgroup to create one.")
                            .with_markup(texts::main_menu())
                    } else {
                        let prompt = format!("📍 Which group should \"{}\" go to?", plant.name);
                        self.enter(
                            user_id,
                            Session::AssignGroup {
                                plant_id: plant.id,
                                plant_name: plant.name,
                            },
                        )
                        .await;
                        let markup = texts::picker(
                            groups.iter().map(|g| g.name.as_str()),
                            &[NO_GROUP_BUTTON, CANCEL_BUTTON],
                        );
                        Reply::text(prompt).with_markup(markup)
                    }
                }
                None => plant_not_found(),
            },
            Session::AssignGroup {
                plant_id,
                plant_name,
            } => self.assign(user_id, plant_id, &plant_name, text).await?,
        };
        Ok(vec![reply])
    }

    async fn add_plant(
        &self,
        user_id: UserId,
        name: &str,
        interval_days: i32,
        plant_type: Option<&str>,
    ) -> Result<Reply, ServiceError> {
        log::info!(
            "Adding plant: user_id={}, name={}, days={}",
            user_id,
            name,
            interval_days
        );
        let reply = match self
            .store
            .add_plant(user_id, name, interval_days, plant_type, self.clock.now())
            .await
        {
            Ok(plant) => Reply::text(format!(
                "✅ Plant \"{}\" added!\nWatering every {} day(s)\n\n\
                 Use /photo to add a photo of your plant.",
                plant.name, plant.interval_days
            )),
            Err(ServiceError::Conflict(_)) => Reply::text(format!(
                "You already have a plant called \"{}\". Choose another name with /add.",
                name
            )),
            Err(e) => return Err(e),
        };
        Ok(reply.with_markup(texts::main_menu()))
    }

    async fn create_group(&self, user_id: UserId, name: &str) -> Result<Reply, ServiceError> {
        let reply = match self
            .store
            .create_group(user_id, name, self.clock.now())
            .await
        {
            Ok(group) => Reply::text(format!(
                "✅ Group \"{}\" created!\nUse /groups to see all your groups.",
                group.name
            )),
            Err(ServiceError::Conflict(_)) => {
                Reply::text(format!("You already have a group called \"{}\".", name))
            }
            Err(e) => return Err(e),
        };
        Ok(reply.with_markup(texts::main_menu()))
    }

    async fn assign(
        &self,
        user_id: UserId,
        plant_id: PlantId,
        plant_name: &str,
        choice: &str,
    ) -> Result<Reply, ServiceError> {
        let reply = if choice == NO_GROUP_BUTTON {
            self.store
                .assign_plant_to_group(user_id, plant_id, None)
                .await?;
            Reply::text(format!("✅ \"{}\" no longer belongs to a group.", plant_name))
        } else {
            match self.store.get_group_by_name(user_id, choice).await? {
                Some(group) => {
                    self.store
                        .assign_plant_to_group(user_id, plant_id, Some(group.id))
                        .await?;
                    Reply::text(format!("✅ \"{}\" moved to \"{}\".", plant_name, group.name))
                }
                None => Reply::text("I couldn't find that group."),
            }
        };
        Ok(reply.with_markup(texts::main_menu()))
    }

    async fn delete(&self, user_id: UserId, name: &str) -> Result<Reply, ServiceError> {
        let plants = self.store.list_plants_for_user(user_id).await?;
        if plants.is_empty() {
            return Ok(Reply::text("🌵 You have no plants to delete."));
        }

        if name.is_empty() {
            let mut message =
                String::from("🗑️ To delete a plant, use:\n/delete <name>\n\n*Your plants:*\n");
            for plant in &plants {
                message.push_str(&format!("• {}\n", escape_markdown(&plant.name)));
            }
            return Ok(Reply::markdown(message));
        }

        let Some(plant) = self.store.get_plant_by_name(user_id, name).await? else {
            return Ok(Reply::text(format!("I couldn't find the plant \"{}\".", name)));
        };
        self.store.delete_plant(user_id, plant.id).await?;
        log::info!("Deleted plant {} for user {}", plant.id, user_id);
        Ok(Reply::text(format!("✅ Plant \"{}\" deleted.", plant.name)))
    }

    async fn photo_index(&self, user_id: UserId) -> Result<Reply, ServiceError> {
        let plants = self.store.list_plants_for_user(user_id).await?;
        if plants.is_empty() {
            return Ok(Reply::text("🌵 You have no plants yet."));
        }

        let mut buttons = Vec::new();
        for plant in &plants {
            let photos = self.store.list_photos(plant.id).await?;
            if !photos.is_empty() {
                buttons.push(InlineKeyboardButton {
                    text: format!("📸 {} ({} photos)", plant.name, photos.len()),
                    callback_data: format!("{}{}", PHOTOS_CALLBACK_PREFIX, plant.id),
                });
            }
        }

        if buttons.is_empty() {
            return Ok(Reply::text(
                "📸 You have no photos yet.\nUse /photo to add photos to your plants.",
            ));
        }
        Ok(Reply::markdown("📸 *Pick a plant to see its photos:*")
            .with_markup(ReplyMarkup::inline(buttons)))
    }

    async fn callback(&self, user_id: UserId, data: &str) -> Result<Vec<Reply>, ServiceError> {
        let Some(plant_id) = data
            .strip_prefix(PHOTOS_CALLBACK_PREFIX)
            .and_then(|id| id.parse().ok())
        else {
            log::warn!("Ignoring unknown callback data {:?} from {}", data, user_id);
            return Ok(Vec::new());
        };

        // Callback data comes from the client; only show the caller's own plants.
        if self.store.get_plant(user_id, plant_id).await?.is_none() {
            return Ok(vec![Reply::text("That plant no longer exists.")]);
        }

        let photos = self.store.list_photos(plant_id).await?;
        Ok(photos
            .iter()
            .take(MAX_PHOTOS_SHOWN)
            .map(|photo| Reply::Photo {
                file_id: photo.file_id.clone(),
                caption: Some(texts::photo_caption(photo)),
            })
            .collect())
    }

    async fn toggle_notifications(&self, user_id: UserId) -> Result<Reply, ServiceError> {
        let (enabled, time) = match self.store.get_user_settings(user_id).await? {
            Some(settings) => (!settings.notifications_enabled, settings.notification_time),
            None => (true, DEFAULT_NOTIFICATION_TIME.to_string()),
        };
        self.store
            .upsert_notification_settings(user_id, enabled, &time)
            .await?;

        Ok(if enabled {
            Reply::text(format!(
                "🔔 Notifications turned on!\n\
                 You will get reminders around {} when your plants need water.",
                time
            ))
        } else {
            Reply::text("🔕 Notifications turned off.")
        })
    }
}

fn cancelled() -> Reply {
    Reply::text("Operation cancelled.").with_markup(texts::main_menu())
}

fn plant_not_found() -> Reply {
    Reply::text("I couldn't find that plant. Try again.").with_markup(texts::main_menu())
}
