use crate::bot::ui::CHECK_JOIN;
use crate::core::flow::{Inbound, Sender};
use crate::core::submission::ImageVariant;
use teloxide::types::{Message, PhotoSize, User};

pub fn sender_of(user: &User) -> Sender {
    Sender {
        id: user.id,
        username: user.username.clone(),
        first_name: user.first_name.clone(),
    }
}

pub fn from_message(msg: &Message) -> Inbound {
    if let Some(sizes) = msg.photo() {
        return Inbound::Image(sizes.iter().map(variant_of).collect());
    }
    msg.text().map_or(Inbound::Unsupported, from_text)
}

pub fn from_text(text: &str) -> Inbound {
    if text.starts_with('/') {
        Inbound::Unsupported
    } else {
        Inbound::Text(text.to_string())
    }
}

pub fn from_callback(data: &str) -> Inbound {
    match data {
        CHECK_JOIN => Inbound::Recheck,
        _ => Inbound::Unsupported,
    }
}

fn variant_of(size: &PhotoSize) -> ImageVariant {
    ImageVariant {
        file_id: size.file.id.clone(),
        file_unique_id: size.file.unique_id.clone(),
        width: size.width,
        height: size.height,
        file_size: size.file.size,
    }
}
