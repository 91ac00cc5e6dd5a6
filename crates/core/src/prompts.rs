//! Scripted wording shared by the text and voice front-ends.

pub const AGENT_INSTRUCTIONS: &str = "\
You are a professional real estate intake agent for a high-quality real estate agency.
Your job is to collect information from potential clients in a friendly, professional manner.

Follow these guidelines:
1. Introduce yourself briefly and explain the purpose of the conversation
2. Collect all required information in a conversational way
3. Ask follow-up questions when appropriate to get more detailed information
4. Validate the information provided and ask for clarification when needed
5. Before concluding, summarize the information collected and verify its accuracy
6. Be respectful of the client's time - keep the conversation efficient but thorough
7. Thank the client for their time at the end
8. Avoid discussing specific properties or giving advice - your role is information gathering only
9. If the client asks questions about the process, provide brief, helpful answers
10. Use a warm, professional tone throughout the conversation

Begin by introducing yourself and explaining that you'll be asking some questions to better
understand their real estate needs. Then proceed through the intake sections in order.";

pub const INITIAL_GREETING: &str = "\
Hello! I'm your real estate intake assistant. I'm here to gather some information about your \
real estate needs so we can match you with the right agent and properties. This will take just \
a few minutes of your time.

I'll be asking questions about your contact information, property goals, search criteria, and \
financing situation. Feel free to ask me any questions along the way. Shall we get started?";

pub const CONTINUE_GATHERING: &str =
    "No problem. Let's continue, and let me know what should be corrected or added.";

pub const LLM_FAILURE_REPLY: &str =
    "I'm sorry, I encountered an error processing your request. Please try again.";

pub fn validation_prompt(summary: &str) -> String {
    format!(
        "Thank you for providing that information. Let me make sure I have everything correctly:\n\n\
         {summary}\n\n\
         Is all of this information correct? If anything needs to be changed or if I've missed \
         something, please let me know."
    )
}

pub fn clarification_prompt(questions: &[String]) -> String {
    let bullets = questions.iter().map(|question| format!("- {question}")).collect::<Vec<_>>();
    format!(
        "I need to clarify a few details to make sure I have the most accurate information for our \
         agents:\n\n\
         {}\n\n\
         Could you please help me fill in these details?",
        bullets.join("\n")
    )
}

pub fn closing_message(transaction_type: Option<&str>) -> String {
    let transaction_type = transaction_type.filter(|kind| !kind.is_empty()).unwrap_or("real estate");
    format!(
        "Thank you for providing all this information! This will be incredibly helpful in finding \
         the right options for you.\n\n\
         One of our experienced real estate agents will reach out to you within 24 hours using your \
         preferred contact method. They'll have all the details you've shared with me and will be \
         ready to help you with your {transaction_type} journey.\n\n\
         Is there anything else you'd like to add before we wrap up?"
    )
}

#[cfg(test)]
mod tests {
    use super::{clarification_prompt, closing_message, validation_prompt};

    #[test]
    fn clarification_prompt_lists_questions_as_bullets() {
        let prompt = clarification_prompt(&[
            "What is your email?".to_string(),
            "What is your phone number?".to_string(),
        ]);
        assert!(prompt.contains("\n\n- What is your email?\n- What is your phone number?\n\n"));
    }

    #[test]
    fn closing_message_defaults_transaction_type() {
        assert!(closing_message(None).contains("your real estate journey"));
        assert!(closing_message(Some("buy")).contains("your buy journey"));
    }

    #[test]
    fn validation_prompt_embeds_summary() {
        let prompt = validation_prompt("Contact Information:\n- Name: Jane Doe\n");
        assert!(prompt.contains("- Name: Jane Doe"));
        assert!(prompt.ends_with("please let me know."));
    }
}
