/// Example requirement texts to start from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Template {
    pub name: &'static str,
    pub requirements: &'static str,
}

pub const TEMPLATES: &[Template] = &[
    Template {
        name: "E-commerce Support Bot",
        requirements: "I need to create a customer support chatbot for an e-commerce platform selling electronics. \
The chatbot should handle order tracking, returns, technical support questions, and product recommendations. \
It should be professional but friendly in tone, and know when to escalate to human support.",
    },
    Template {
        name: "Healthcare Assistance Bot",
        requirements: "I'm building a healthcare assistance chatbot that helps patients book appointments, \
answer basic medical questions, provide medication reminders, and direct emergencies to appropriate services. \
It needs to be empathetic and clear, while remaining HIPAA compliant and cautious with medical advice.",
    },
    Template {
        name: "Educational Tutor Bot",
        requirements: "I want to develop an educational chatbot that helps students with math problems, \
explains scientific concepts, provides study tips, and creates quizzes. It should be encouraging and \
adapt its explanations based on the student's age and understanding level.",
    },
];

/// Look up a template by name, ignoring case, spaces, and dashes.
pub fn find(name: &str) -> Option<&'static Template> {
    let wanted = slug(name);
    TEMPLATES.iter().find(|t| slug(t.name) == wanted)
}

fn slug(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}
