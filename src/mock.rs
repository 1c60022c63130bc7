//! Canned demo content
//!
//! The analyzer does not talk to a real analysis service; the conversation
//! and the report served here stand in for one.

use crate::store::{Message, QuickReply};

const GREETING_IMAGE_URL: &str = "https://hebbkx1anhila5yf.public.blob.vercel-storage.com/image-y3E2mZCSjfPC5yLu25ZcMT8EPyw7hY.png";

const ANALYSIS_REPORT: &str = r#"## Conversation Analysis

### Strengths:
- The bot provided clear options for the user to select from
- The appointment booking flow was straightforward and efficient
- The bot confirmed the appointment details and sent a confirmation email
- The bot maintained a friendly tone throughout the conversation

### Areas for Improvement:
- The bot initially didn't understand the "Book checkup" request, which created an unnecessary step
- The bot didn't ask about the specific issues with the bike that need checking
- No information was provided about the expected duration or cost of the checkup
- The bot didn't offer alternative dates before asking for personal information

### Recommendations:
1. Improve the natural language understanding to better recognize common requests like "Book checkup"
2. Add a step to ask about specific issues with the bike to better prepare the technician
3. Provide information about the expected duration and cost of the service
4. Offer a wider range of appointment slots before proceeding with the booking
5. Add a follow-up message a day before the appointment as a reminder
"#;

/// The canned analysis report
pub fn analysis_report() -> &'static str {
    ANALYSIS_REPORT
}

/// Simulated bike-shop booking conversation
pub fn demo_conversation() -> Vec<Message> {
    let check = |text: &str| QuickReply::with_icon(text, "check");

    vec![
        Message::bot(
            "Hey rider 🚲 I'm your virtual agent from Team Bike. I can guide you if you don't know what to look for, book checkups and try-outs, or even track your order 😊\nHow can I help you today?",
        )
        .with_image(GREETING_IMAGE_URL),
        Message::user("Book checkup."),
        Message::bot(
            "I'm afraid I didn't catch that... But here are topics that I can help you with 😊",
        )
        .with_quick_replies(vec![
            check("I'm new"),
            check("Book checkup"),
            check("Book try-out"),
            check("Track order"),
        ]),
        Message::user("Book checkup"),
        Message::bot(
            "Need a checkup or repair? I can book an appointment for you so that we look into it 👀\nWould tomorrow at 10am suit you?",
        )
        .with_quick_replies(vec![
            check("Book it"),
            QuickReply::with_icon("Other slots", "calendar"),
        ]),
        Message::user("Book it"),
        Message::bot("Alright, let's book this one!\nWhat's the bike model that needs to be checked?")
            .with_quick_replies(vec![
                QuickReply::new("James"),
                QuickReply::new("Robin"),
                QuickReply::new("Charlie"),
            ]),
        Message::user("James"),
        Message::bot(
            "A bike, noted. Would you like to add a note if there is something special that we should know beforehand?",
        ),
        Message::user("No."),
        Message::bot(
            "Fine, let me just take your info now so that we can confirm the appointment by email.\nWhat email address can we use?",
        ),
        Message::user("john.doe@email.com"),
        Message::bot("And your name please?"),
        Message::user("John Doe"),
        Message::bot(
            "You should have received a confirmation in your mailbox 😊 Thanks for reaching John Doe!",
        ),
    ]
}
