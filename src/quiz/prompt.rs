use crate::quiz::models::QuizRequest;

pub fn build_prompt(request: &QuizRequest) -> String {
    format!(
        "Generate a {} question quiz about {}. Return only a JSON array. \
         Each item must be an object with: \
         {{ \"question\": \"...\", \"options\": [\"..\", \"..\"], \"answer\": \"the correct option string\" }}. \
         Every item must have at least two distinct options and the answer must be exactly one of them. \
         Do not include any commentary or markdown formatting outside the array.",
        request.question_count, request.topic
    )
}
