//! Outbound message catalog.

use crate::farm::{AdviceResult, FarmerProfile, MarketData, WeatherData};

pub const WELCOME: &str = "🌱 Welcome to Farm Assistant!

I'm here to help you with:
• 📝 Farmer registration
• 🌤️ Weather-based advice
• 💰 Market price insights
• 🤖 AI-powered recommendations

Type \"help\" to see all commands.";

pub const GREETING: &str = "👋 Hello! I'm your Farm Assistant.

Type \"register\" to get started, or \"help\" to see what I can do.";

pub const HELP: &str = "📋 Available Commands:

• \"register\" - Register as a farmer
• \"advice\" - Get farming advice
• \"feedback\" - Send feedback
• \"status\" - Check your profile
• \"help\" - Show this help
• \"hi\" or \"hey\" - Greeting

Just type any command directly!

Already know your details? Register in one message:
Name: [Your Name]
Crop: [Crop Type, Another Crop]
Location: [Your Location]
Language: [English/Local]";

pub const INVALID_COMMAND: &str = "❌ I didn't understand that command.

Type \"help\" to see available commands.";

pub const REGISTER_START: &str = "📝 Let's register you as a farmer!

What is your full name?";

pub const ASK_NAME_AGAIN: &str = "✏️ Please type your full name.";

pub const ASK_FIRST_CROP: &str =
    "🌾 Thanks! What crop do you grow? (e.g., maize, rice, wheat, vegetables, beans)";

pub const ASK_FIRST_CROP_AGAIN: &str = "🌾 Please type the name of a crop you grow.";

pub const ADD_MORE_CROPS: &str = "🌱 What other crop do you grow?
(e.g., maize, rice, wheat, vegetables, beans, etc.)

Type \"done\" when you're finished adding crops.";

pub const ASK_LOCATION_AGAIN: &str =
    "📍 Please tell me where your farm is located (e.g., city, region, state).";

pub const ASK_LANGUAGE: &str = "🗣️ Which language would you like your advice in? (e.g., English, Hausa, Yoruba)";

pub const ASK_LANGUAGE_AGAIN: &str = "🗣️ Please type your preferred language.";

pub const INVALID_FORM: &str = "❌ Invalid format. Please provide your information in this format:

Name: [Your Name]
Crop: [Crop Type]
Location: [Your Location]
Language: [English/Local]";

pub const REGISTRATION_RESET: &str =
    "⚠️ Something went wrong with your registration. Type \"register\" to start again.";

pub const ADVICE_REQUEST: &str = "🤖 Getting your personalized farming advice...

This may take a moment while I analyze:
• Your farm profile
• Current weather conditions
• Market prices
• Best practices";

pub const ADVICE_PROGRESS: [&str; 3] = [
    "🌤️ Checking the weather at your farm...",
    "💰 Looking up current market prices...",
    "🧠 Preparing your recommendations...",
];

pub const ADVICE_UNREGISTERED: &str =
    "❌ Please register first using 'register' to get personalized advice.";

pub const ADVICE_FAILED: &str =
    "❌ Sorry, I couldn't generate advice right now. Please try again later.";

pub const FEEDBACK_REQUEST: &str = "📝 Share your feedback!

You can tell me about:
• \"Planted\" - I've planted my crops
• \"Harvested\" - I've harvested
• \"Pest problem\" - I have pest issues
• \"Weather issue\" - Weather problems
• \"Market update\" - Market information
• Or any other updates

Just type your feedback after \"feedback\"";

pub const FEEDBACK_UNREGISTERED: &str =
    "❌ Please register first using 'register' to provide feedback.";

pub const FEEDBACK_FAILED: &str = "❌ Error processing your feedback. Please try again.";

pub const STATUS_UNREGISTERED: &str =
    "❌ You're not registered yet. Use 'register' to get started!";

pub const INTERNAL_ERROR: &str = "❌ Something went wrong. Please try again in a moment.";

pub fn welcome(sender: &str) -> String {
    format!("Hey, {sender}! {WELCOME}")
}

pub fn more_crops_question(crop: &str) -> String {
    format!(
        "🌾 Great! You grow {crop}.

Do you grow any other crops?
• Type \"yes\" to add more crops
• Type \"no\" to continue with location"
    )
}

pub fn crop_added(crop: &str) -> String {
    format!("✅ Added {crop}.\n\n{ADD_MORE_CROPS}")
}

pub fn crops_complete(crops: &str) -> String {
    format!(
        "✅ Perfect! You grow: {crops}

Now, where is your farm located? (e.g., city, region, state)"
    )
}

pub fn registration_complete(profile: &FarmerProfile) -> String {
    format!(
        "✅ Registration complete!

📝 Name: {}
🌱 Crops: {}
📍 Location: {}
🗣️ Language: {}

Your farmer profile has been saved. You can now:
• Get personalized advice with \"advice\"
• Update your status with \"feedback\"
• Check your profile with \"status\"",
        profile.name(),
        profile.crops_display(),
        profile.location(),
        profile.language(),
    )
}

pub fn status(profile: &FarmerProfile) -> String {
    format!(
        "👤 *Your Farmer Profile*

📝 *Name:* {}
🌱 *Crops:* {}
📍 *Location:* {}
🗣️ *Language:* {}
📱 *Phone:* {}

You can:
• Get advice with \"advice\"
• Send feedback with \"feedback\"
• Update your profile anytime with \"register\"",
        profile.name(),
        profile.crops_display(),
        profile.location(),
        profile.language(),
        profile.phone(),
    )
}

/// The composed advice message.
pub fn advice(advice: &AdviceResult, weather: &WeatherData, market: &MarketData) -> String {
    format!(
        "🌱 *Your Personalized Farming Advice*

🌤️ *Weather Conditions:*
• Temperature: {:.1}°C
• Humidity: {:.1}%
• Condition: {}
• Rainfall: {:.1}mm

💰 *Market Information:*
• {} Price: {}{:.2} per {}
• Trend: {}

🤖 *AI Recommendations:*

🌱 *Planting:* {}

💧 *Irrigation:* {}

🌾 *Harvest:* {}

📈 *Market Strategy:* {}

💡 *General Advice:* {}

*Confidence: {}% | Generated: {}*",
        weather.temperature,
        weather.humidity,
        weather.condition,
        weather.rainfall,
        market.crop_type,
        market.currency,
        market.price,
        market.unit,
        market.trend.label(),
        advice.planting,
        advice.irrigation,
        advice.harvest,
        advice.market,
        advice.general,
        advice.confidence,
        advice.generated_at.format("%Y-%m-%d"),
    )
}
