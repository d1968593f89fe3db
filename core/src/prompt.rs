/// Prompt asking the model to split a meal into dishes and list the acne risk
/// of every ingredient.
///
/// `description` is either a comma-joined list of dish names or free text.
#[must_use]
pub fn build_meal_prompt(description: &str) -> String {
    let description = description.trim();
    format!(
        r#"You are a nutrition assistant that assesses how likely foods are to trigger acne.

Analyze the following meal: "{description}"

Follow these steps:
1. Split the meal into its distinct dishes.
2. If a dish is ambiguous, list each plausible variation as its own dish and put the variation in parentheses after the dish name, for example "Biryani (chicken)" and "Biryani (vegetable)".
3. For every dish or variation, list at least 10 ingredients. Name specific meat cuts (for example "chicken thigh" or "beef brisket") instead of generic categories like "meat".
4. Give every ingredient an acne risk of "low", "medium" or "high" and a short explanation of why.
5. Respond with ONLY a JSON object in exactly this shape, with no extra text and no code fences:

{{"meals": [{{"dish": "Dish name", "ingredients": [{{"name": "Ingredient name", "acneRisk": "low", "explanation": "Short reason"}}]}}]}}"#
    )
}

/// Prompt asking the model to assess a single ingredient.
#[must_use]
pub fn build_ingredient_prompt(name: &str) -> String {
    let name = name.trim();
    format!(
        r#"You are a nutrition assistant that assesses how likely foods are to trigger acne.

Analyze this single ingredient: "{name}"

Give it an acne risk of "low", "medium" or "high" and a short explanation of why.
Respond with ONLY a JSON object in exactly this shape, with no extra text and no code fences:

{{"name": "Ingredient name", "acneRisk": "low", "explanation": "Short reason"}}"#
    )
}
