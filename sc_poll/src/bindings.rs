use alloy::sol;

sol! {
    #[sol(rpc)]
    contract PollSystem {
        event PollCreated(uint256 indexed pollId, string question, address indexed creator);
        event Voted(uint256 indexed pollId, uint256 optionIndex, address indexed voter);

        function createPoll(string _question, string[] _options) external returns (uint256);
        function getPollDetails(uint256 _pollId)
            external
            view
            returns (string question, string[] options, uint256 createdAt, bool isActive, address creator);
        function getPollResults(uint256 _pollId) external view returns (uint256[]);
        function hasVoted(uint256 _pollId, address _voter) external view returns (bool);
        function pollCount() external view returns (uint256);
        function vote(uint256 _pollId, uint256 _optionIndex) external;
    }
}
